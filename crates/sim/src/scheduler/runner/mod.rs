//! Run scheduler, split into focused submodules:
//! - `core`: struct, constructor, accessors, stop, source switching, shutdown
//! - `live`: live start and the generation tick loop
//! - `replay`: replay start and the replay loop

mod core;
mod live;
mod replay;

pub use self::core::RunScheduler;
