//! Live-device adapter.
//!
//! Readings come from the robot controller over HTTP. One status snapshot is
//! fetched per tick and shared by every joint of that tick. A joint or pose
//! the controller does not report is an error, never a default value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use armwatch_core::config::DeviceConfig;
use armwatch_core::{JointSample, PoseSample};

use super::faults::{apply_joint_faults, apply_pose_faults, JointReading, PoseReading};
use super::{DataSource, SampleContext, SourceError, SourceKind};

/// Data older than this marks the device as unavailable.
const FRESHNESS_SECS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceJoint {
    pub current: Option<f64>,
    pub temperature: Option<f64>,
    pub vibration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePose {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub rx: Option<f64>,
    pub ry: Option<f64>,
    pub rz: Option<f64>,
}

/// Body of `GET /robot/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub joints: Vec<DeviceJoint>,
    pub pose: Option<DevicePose>,
}

/// Request/response channel to the robot controller.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn fetch_status(&self) -> Result<DeviceStatus, SourceError>;

    async fn health(&self) -> Result<(), SourceError>;
}

/// [`DeviceClient`] over HTTP with a bearer token and a per-request timeout.
#[derive(Debug)]
pub struct HttpDeviceClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn from_config(config: &DeviceConfig) -> Result<Self, SourceError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| SourceError::NotConfigured("DEVICE_BASE_URL is not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn fetch_status(&self) -> Result<DeviceStatus, SourceError> {
        let response = self.get("/robot/status").send().await?.error_for_status()?;
        Ok(response.json::<DeviceStatus>().await?)
    }

    async fn health(&self) -> Result<(), SourceError> {
        let response = self.get("/health").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "health check returned {status}"
            )));
        }
        Ok(())
    }
}

/// [`DataSource`] backed by a live robot controller.
pub struct DeviceSource {
    client: Arc<dyn DeviceClient>,
    max_retries: u32,
    connected: AtomicBool,
    last_received: Mutex<Option<DateTime<Utc>>>,
    /// Snapshot of the current tick, keyed by tick timestamp.
    snapshot: tokio::sync::Mutex<Option<(DateTime<Utc>, DeviceStatus)>>,
}

impl DeviceSource {
    pub fn new(client: Arc<dyn DeviceClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            connected: AtomicBool::new(false),
            last_received: Mutex::new(None),
            snapshot: tokio::sync::Mutex::new(None),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Result<Self, SourceError> {
        let client = HttpDeviceClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), config.max_retries))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), SourceError> {
        match self.client.health().await {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn fetch_with_retry(&self) -> Result<DeviceStatus, SourceError> {
        let mut attempt = 0u32;
        loop {
            let result = if self.is_connected() {
                self.client.fetch_status().await
            } else {
                match self.connect().await {
                    Ok(()) => self.client.fetch_status().await,
                    Err(e) => Err(e),
                }
            };

            match result {
                Ok(status) => {
                    *self
                        .last_received
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                    return Ok(status);
                }
                Err(e) => {
                    self.connected.store(false, Ordering::Release);
                    if attempt >= self.max_retries {
                        tracing::warn!(attempts = attempt + 1, error = %e, "device fetch failed");
                        return Err(e);
                    }
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "device fetch failed, reconnecting");
                }
            }
        }
    }

    async fn snapshot(&self, ts: DateTime<Utc>) -> Result<DeviceStatus, SourceError> {
        let mut cached = self.snapshot.lock().await;
        if let Some((at, status)) = cached.as_ref() {
            if *at == ts {
                return Ok(status.clone());
            }
        }
        let status = self.fetch_with_retry().await?;
        *cached = Some((ts, status.clone()));
        Ok(status)
    }
}

fn no_noise(_sigma: f64) -> f64 {
    0.0
}

#[async_trait]
impl DataSource for DeviceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LiveDevice
    }

    async fn joint_sample(&self, ctx: &SampleContext, joint_index: u32) -> Result<JointSample, SourceError> {
        let status = self.snapshot(ctx.ts).await?;
        let joint = status
            .joints
            .get(joint_index as usize)
            .ok_or(SourceError::MissingJoint(joint_index))?;
        let (Some(current_a), Some(vibration_rms), Some(temperature_c)) =
            (joint.current, joint.vibration, joint.temperature)
        else {
            return Err(SourceError::MissingJoint(joint_index));
        };

        let mut reading = JointReading {
            current_a,
            vibration_rms,
            temperature_c,
        };
        let label = apply_joint_faults(&mut reading, &ctx.faults, ctx.ts, &mut no_noise);

        Ok(JointSample {
            ts: ctx.ts,
            robot_id: ctx.robot_id,
            joint_index,
            current_a: reading.current_a,
            vibration_rms: reading.vibration_rms,
            temperature_c: reading.temperature_c,
            run_id: ctx.run_id,
            label,
        })
    }

    async fn pose_sample(&self, ctx: &SampleContext) -> Result<PoseSample, SourceError> {
        let status = self.snapshot(ctx.ts).await?;
        let pose = status.pose.ok_or(SourceError::MissingPose)?;
        let (Some(x), Some(y), Some(z), Some(rx), Some(ry), Some(rz)) =
            (pose.x, pose.y, pose.z, pose.rx, pose.ry, pose.rz)
        else {
            return Err(SourceError::MissingPose);
        };

        let mut reading = PoseReading { x, y, z, rx, ry, rz };
        let label = apply_pose_faults(&mut reading, &ctx.faults, ctx.ts, &mut no_noise);

        Ok(PoseSample {
            ts: ctx.ts,
            robot_id: ctx.robot_id,
            x: reading.x,
            y: reading.y,
            z: reading.z,
            rx: reading.rx,
            ry: reading.ry,
            rz: reading.rz,
            run_id: ctx.run_id,
            label,
        })
    }

    async fn is_available(&self) -> bool {
        let last = *self
            .last_received
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.is_connected()
            && last.is_some_and(|t| Utc::now() - t < chrono::Duration::seconds(FRESHNESS_SECS))
    }

    async fn initialize(&self) -> Result<(), SourceError> {
        match self.connect().await {
            Ok(()) => {
                tracing::info!("live device connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "live device initialization failed");
                Err(e)
            }
        }
    }

    async fn shutdown(&self) {
        self.connected.store(false, Ordering::Release);
        *self.snapshot.lock().await = None;
        tracing::info!("live device disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armwatch_core::{ErrorCategory, FaultInjection, FaultKind, NominalParams, SampleLabel};
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct MockDevice {
        status: DeviceStatus,
        fetches: AtomicUsize,
        health_checks: AtomicUsize,
        failures_left: AtomicUsize,
        healthy: bool,
    }

    impl MockDevice {
        fn new(status: DeviceStatus) -> Self {
            Self {
                status,
                fetches: AtomicUsize::new(0),
                health_checks: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(0),
                healthy: true,
            }
        }

        fn failing(self, times: usize) -> Self {
            self.failures_left.store(times, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl DeviceClient for MockDevice {
        async fn fetch_status(&self) -> Result<DeviceStatus, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(SourceError::Unavailable("connection reset".into()));
            }
            Ok(self.status.clone())
        }

        async fn health(&self) -> Result<(), SourceError> {
            self.health_checks.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(SourceError::Unavailable("health check returned 503".into()))
            }
        }
    }

    fn status(joints: usize) -> DeviceStatus {
        DeviceStatus {
            joints: (0..joints)
                .map(|i| DeviceJoint {
                    current: Some(2.0 + i as f64),
                    temperature: Some(41.0),
                    vibration: Some(0.1),
                })
                .collect(),
            pose: Some(DevicePose {
                x: Some(500.0),
                y: Some(300.0),
                z: Some(200.0),
                rx: Some(0.1),
                ry: Some(0.2),
                rz: Some(0.3),
            }),
        }
    }

    fn ctx() -> SampleContext {
        SampleContext {
            ts: Utc::now(),
            robot_id: Uuid::new_v4(),
            run_id: None,
            base: NominalParams::default(),
            faults: Vec::new(),
        }
    }

    #[tokio::test]
    async fn one_fetch_serves_a_whole_tick() {
        let device = Arc::new(MockDevice::new(status(6)));
        let source = DeviceSource::new(device.clone(), 2);
        source.initialize().await.unwrap();
        let c = ctx();

        for joint in 0..6 {
            let s = source.joint_sample(&c, joint).await.unwrap();
            assert_eq!(s.current_a, 2.0 + joint as f64);
            assert_eq!(s.ts, c.ts);
        }
        source.pose_sample(&c).await.unwrap();
        assert_eq!(device.fetches.load(Ordering::SeqCst), 1);
        assert!(source.is_available().await);

        let mut next = c.clone();
        next.ts = c.ts + chrono::Duration::seconds(1);
        source.joint_sample(&next, 0).await.unwrap();
        assert_eq!(device.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreported_joint_is_data_unavailable() {
        let source = DeviceSource::new(Arc::new(MockDevice::new(status(3))), 0);
        source.initialize().await.unwrap();

        let err = source.joint_sample(&ctx(), 4).await.unwrap_err();
        assert!(matches!(err, SourceError::MissingJoint(4)));
        assert_eq!(err.category(), ErrorCategory::DataUnavailable);
    }

    #[tokio::test]
    async fn partial_joint_reading_is_rejected() {
        let mut s = status(2);
        s.joints[1].temperature = None;
        let source = DeviceSource::new(Arc::new(MockDevice::new(s)), 0);
        source.initialize().await.unwrap();
        assert!(source.joint_sample(&ctx(), 1).await.is_err());
    }

    #[tokio::test]
    async fn transient_failure_is_retried_after_reconnect() {
        let device = Arc::new(MockDevice::new(status(1)).failing(1));
        let source = DeviceSource::new(device.clone(), 2);
        source.initialize().await.unwrap();

        source.joint_sample(&ctx(), 0).await.unwrap();
        assert_eq!(device.fetches.load(Ordering::SeqCst), 2);
        // initialize + reconnect
        assert_eq!(device.health_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_failure_surfaces_after_retries() {
        let device = Arc::new(MockDevice::new(status(1)).failing(10));
        let source = DeviceSource::new(device.clone(), 2);
        source.initialize().await.unwrap();

        let err = source.joint_sample(&ctx(), 0).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DataUnavailable);
        assert_eq!(device.fetches.load(Ordering::SeqCst), 3);
        assert!(!source.is_available().await);
    }

    #[tokio::test]
    async fn failed_health_check_fails_initialize() {
        let mut device = MockDevice::new(status(1));
        device.healthy = false;
        let source = DeviceSource::new(Arc::new(device), 0);

        assert!(source.initialize().await.is_err());
        assert!(!source.is_available().await);
    }

    #[tokio::test]
    async fn faults_apply_to_device_readings() {
        let source = DeviceSource::new(Arc::new(MockDevice::new(status(1))), 0);
        source.initialize().await.unwrap();
        let mut c = ctx();
        c.faults = vec![FaultInjection::new(
            Uuid::new_v4(),
            FaultKind::HighVibration,
            c.ts,
            c.ts + chrono::Duration::seconds(5),
        )];

        let s = source.joint_sample(&c, 0).await.unwrap();
        assert_eq!(s.label, SampleLabel::FaultHighVibration);
        assert!(s.vibration_rms > 0.45);
    }

    #[test]
    fn http_client_requires_base_url() {
        let config = DeviceConfig {
            base_url: None,
            api_key: None,
            timeout_ms: 500,
            max_retries: 1,
        };
        let err = HttpDeviceClient::from_config(&config).unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(_)));
    }

    #[test]
    fn status_payload_parses_with_missing_fields() {
        let status: DeviceStatus =
            serde_json::from_str(r#"{"joints":[{"current":2.1,"temperature":40.2}]}"#).unwrap();
        assert_eq!(status.joints.len(), 1);
        assert_eq!(status.joints[0].vibration, None);
        assert!(status.pose.is_none());
    }
}
