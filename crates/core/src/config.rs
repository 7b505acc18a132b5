use std::env;

use serde::{Deserialize, Serialize};

use crate::channel::Metric;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(default)
}

// ── Fixed detection constants ─────────────────────────────────

/// Length of the trailing window detectors evaluate.
pub const DETECTION_WINDOW_SECS: i64 = 60;
/// Detection runs only once a channel window holds this many values.
pub const MIN_DETECTION_SAMPLES: usize = 10;
/// Trailing window for the alarm-storm suppression count.
pub const SUPPRESSION_WINDOW_SECS: i64 = 60;
/// Alarms (including the new one) per robot + kind inside the window that trigger suppression.
pub const SUPPRESSION_THRESHOLD: usize = 3;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub simulation: SimulationConfig,
    pub detection: DetectionConfig,
    pub device: DeviceConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ARMWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ARMWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            simulation: SimulationConfig::from_env_profiled(p),
            detection: DetectionConfig::from_env_profiled(p),
            device: DeviceConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  simulation:  rate_hz={}, worker_threads={}",
            self.simulation.default_rate_hz,
            self.simulation.worker_threads
        );
        tracing::info!("  detection:   zscore_threshold={}", self.detection.zscore_threshold);
        tracing::info!(
            "  device:      url={}, timeout_ms={}",
            self.device.base_url.as_deref().unwrap_or("(none)"),
            self.device.timeout_ms
        );
        tracing::info!("  notify:      webhook={}", self.notify.is_configured());
    }

    /// Return a redacted view without secrets.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "simulation": {
                "default_rate_hz": self.simulation.default_rate_hz,
                "worker_threads": self.simulation.worker_threads,
            },
            "detection": {
                "window_secs": DETECTION_WINDOW_SECS,
                "min_samples": MIN_DETECTION_SAMPLES,
                "zscore_threshold": self.detection.zscore_threshold,
                "bands": self.detection.bands_summary(),
            },
            "suppression": {
                "window_secs": SUPPRESSION_WINDOW_SECS,
                "threshold": SUPPRESSION_THRESHOLD,
            },
            "device": {
                "base_url": self.device.base_url,
                "timeout_ms": self.device.timeout_ms,
                "max_retries": self.device.max_retries,
                "configured": self.device.is_configured(),
            },
            "notify": {
                "webhook_configured": self.notify.is_configured(),
                "webhook_timeout_ms": self.notify.webhook_timeout_ms,
            },
        })
    }
}

// ── Simulation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub default_rate_hz: u32,
    /// Scheduler pool size; 0 means one per available core.
    pub worker_threads: usize,
}

impl SimulationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            default_rate_hz: profiled_env_u32(p, "SIM_RATE_HZ", 1).max(1),
            worker_threads: profiled_env_u32(p, "SIM_WORKER_THREADS", 0) as usize,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_rate_hz: 1,
            worker_threads: 0,
        }
    }
}

// ── Detection ─────────────────────────────────────────────────

/// Inclusive normal band for a threshold detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub lower: f64,
    pub upper: f64,
}

impl ThresholdBand {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn default_for(metric: Metric) -> Self {
        match metric {
            Metric::Current => Self::new(0.2, 6.0),
            Metric::Vibration => Self::new(0.0, 0.5),
            Metric::Temperature => Self::new(5.0, 80.0),
            Metric::PosePosition => Self::new(100.0, 1500.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub current: ThresholdBand,
    pub vibration: ThresholdBand,
    pub temperature: ThresholdBand,
    pub pose_position: ThresholdBand,
    pub zscore_threshold: f64,
}

impl DetectionConfig {
    fn from_env_profiled(p: &str) -> Self {
        let band = |metric: Metric| {
            let d = ThresholdBand::default_for(metric);
            let name = metric.slug().to_uppercase();
            ThresholdBand::new(
                profiled_env_f64(p, &format!("THRESHOLD_{name}_LOWER"), d.lower),
                profiled_env_f64(p, &format!("THRESHOLD_{name}_UPPER"), d.upper),
            )
        };
        Self {
            current: band(Metric::Current),
            vibration: band(Metric::Vibration),
            temperature: band(Metric::Temperature),
            pose_position: band(Metric::PosePosition),
            zscore_threshold: profiled_env_f64(p, "ZSCORE_THRESHOLD", 3.0),
        }
    }

    pub fn band(&self, metric: Metric) -> ThresholdBand {
        match metric {
            Metric::Current => self.current,
            Metric::Vibration => self.vibration,
            Metric::Temperature => self.temperature,
            Metric::PosePosition => self.pose_position,
        }
    }

    fn bands_summary(&self) -> serde_json::Value {
        let mut bands = serde_json::Map::new();
        for metric in Metric::ALL {
            let b = self.band(metric);
            bands.insert(metric.slug().to_string(), serde_json::json!([b.lower, b.upper]));
        }
        serde_json::Value::Object(bands)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            current: ThresholdBand::default_for(Metric::Current),
            vibration: ThresholdBand::default_for(Metric::Vibration),
            temperature: ThresholdBand::default_for(Metric::Temperature),
            pose_position: ThresholdBand::default_for(Metric::PosePosition),
            zscore_threshold: 3.0,
        }
    }
}

// ── Live device ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl DeviceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "DEVICE_BASE_URL"),
            api_key: profiled_env_opt(p, "DEVICE_API_KEY"),
            timeout_ms: profiled_env_u64(p, "DEVICE_TIMEOUT_MS", 2000),
            max_retries: profiled_env_u32(p, "DEVICE_MAX_RETRIES", 2),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    /// Per-request timeout for webhook deliveries.
    pub webhook_timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_ms: 5000,
        }
    }
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            webhook_url: profiled_env_opt(p, "NOTIFY_WEBHOOK_URL"),
            webhook_timeout_ms: profiled_env_u64(p, "NOTIFY_WEBHOOK_TIMEOUT_MS", 5000).max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}
