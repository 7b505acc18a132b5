use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{DataSource, SourceKind};

/// Holder of the single active [`DataSource`].
///
/// Readers take the read side while they depend on the active source staying
/// put (registering a run); a swap takes the write side.
pub struct DataSourceCell {
    active: RwLock<Arc<dyn DataSource>>,
}

impl DataSourceCell {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            active: RwLock::new(source),
        }
    }

    /// Snapshot of the active source.
    pub async fn current(&self) -> Arc<dyn DataSource> {
        self.active.read().await.clone()
    }

    pub async fn kind(&self) -> SourceKind {
        self.active.read().await.kind()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Arc<dyn DataSource>> {
        self.active.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Arc<dyn DataSource>> {
        self.active.write().await
    }
}

impl std::fmt::Debug for DataSourceCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = self.active.try_read().map(|s| s.kind().to_string());
        f.debug_struct("DataSourceCell")
            .field("active", &kind.as_deref().unwrap_or("<locked>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;

    #[tokio::test]
    async fn write_replaces_active_source() {
        let cell = DataSourceCell::new(Arc::new(SyntheticSource::seeded(1)));
        assert_eq!(cell.kind().await, SourceKind::Synthetic);

        let first = cell.current().await;
        {
            let mut active = cell.write().await;
            *active = Arc::new(SyntheticSource::seeded(2));
        }
        let second = cell.current().await;
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
