use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RobotId = Uuid;
pub type RunId = Uuid;
pub type FaultId = Uuid;

pub const DEFAULT_JOINT_COUNT: u32 = 6;

// ── Robot ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    pub model: String,
    pub joint_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Robot {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            model: model.into(),
            joint_count: DEFAULT_JOINT_COUNT,
            created_at: Utc::now(),
        }
    }

    pub fn with_joints(mut self, joint_count: u32) -> Self {
        self.joint_count = joint_count;
        self
    }
}

// ── Samples ───────────────────────────────────────────────────

/// Label attached to every generated sample: `Normal`, or the fault that
/// shaped the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleLabel {
    #[default]
    Normal,
    FaultOverheat,
    FaultHighVibration,
    FaultCurrentSpike,
    FaultSensorDrift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub ts: DateTime<Utc>,
    pub robot_id: RobotId,
    pub joint_index: u32,
    pub current_a: f64,
    pub vibration_rms: f64,
    pub temperature_c: f64,
    pub run_id: Option<RunId>,
    pub label: SampleLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub ts: DateTime<Utc>,
    pub robot_id: RobotId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub run_id: Option<RunId>,
    pub label: SampleLabel,
}

impl PoseSample {
    /// Euclidean distance of the tool point from the base origin.
    pub fn position_magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

// ── Fault injections ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    Overheat,
    HighVibration,
    CurrentSpike,
    SensorDrift,
}

impl FaultKind {
    pub fn label(&self) -> SampleLabel {
        match self {
            FaultKind::Overheat => SampleLabel::FaultOverheat,
            FaultKind::HighVibration => SampleLabel::FaultHighVibration,
            FaultKind::CurrentSpike => SampleLabel::FaultCurrentSpike,
            FaultKind::SensorDrift => SampleLabel::FaultSensorDrift,
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Overheat => write!(f, "overheat"),
            FaultKind::HighVibration => write!(f, "high_vibration"),
            FaultKind::CurrentSpike => write!(f, "current_spike"),
            FaultKind::SensorDrift => write!(f, "sensor_drift"),
        }
    }
}

impl std::str::FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "overheat" => Ok(FaultKind::Overheat),
            "high_vibration" => Ok(FaultKind::HighVibration),
            "current_spike" => Ok(FaultKind::CurrentSpike),
            "sensor_drift" => Ok(FaultKind::SensorDrift),
            other => Err(format!("unknown fault kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultInjection {
    pub id: FaultId,
    pub run_id: RunId,
    pub kind: FaultKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Free-form numeric parameters, e.g. `amplitude` or `drift_rate`.
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

impl FaultInjection {
    pub fn new(run_id: RunId, kind: FaultKind, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            kind,
            start,
            end,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Active over the half-open interval `[start, end)`.
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.params.get(name).copied().unwrap_or(default)
    }

    /// Seconds since the fault became active (0 before the start).
    pub fn elapsed_secs(&self, at: DateTime<Utc>) -> f64 {
        let ms = (at - self.start).num_milliseconds().max(0);
        ms as f64 / 1000.0
    }
}

// ── Scenario runs ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Samples are generated on each tick and recorded; the only replayable mode.
    Live,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Created,
    Running,
    Stopped,
    Finished,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Created => write!(f, "CREATED"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Stopped => write!(f, "STOPPED"),
            RunStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Nominal operating point the synthetic model oscillates around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NominalParams {
    pub current_a: f64,
    pub temperature_c: f64,
    pub vibration_rms: f64,
}

impl Default for NominalParams {
    fn default() -> Self {
        Self {
            current_a: 2.5,
            temperature_c: 40.0,
            vibration_rms: 0.08,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub id: RunId,
    pub name: String,
    /// Target robot; `None` means the first robot known to the store.
    pub robot_id: Option<RobotId>,
    pub mode: RunMode,
    pub rate_hz: u32,
    pub seed: u64,
    pub status: RunStatus,
    #[serde(default)]
    pub base: NominalParams,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScenarioRun {
    /// New run in `CREATED` with a wall-clock derived seed.
    pub fn new(name: impl Into<String>, mode: RunMode, rate_hz: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            robot_id: None,
            mode,
            rate_hz,
            seed: now.timestamp_millis().unsigned_abs(),
            status: RunStatus::Created,
            base: NominalParams::default(),
            started_at: None,
            ended_at: None,
            created_at: now,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn for_robot(mut self, robot_id: RobotId) -> Self {
        self.robot_id = Some(robot_id);
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}
