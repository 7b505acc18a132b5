mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use armwatch_compute::{AlarmCorrelator, AnomalyPipeline, DetectorRegistry, WindowStore};
use armwatch_core::config::load_dotenv;
use armwatch_core::{
    AlarmStore, Config, FaultInjection, FaultKind, MemoryStore, Robot, RunMode, RunStatus,
    ScenarioRun, TelemetryStore,
};
use armwatch_notify::{Dispatcher, LogNotifier, Notifier, WebhookNotifier};
use armwatch_sim::source::faults::{PARAM_AMPLITUDE, PARAM_DRIFT_RATE};
use armwatch_sim::{
    summarize_run, DataSourceCell, DeviceSource, RunScheduler, SchedulerConfig, SyntheticSource,
};

use crate::cli::{CliArgs, Command, FaultSpec, SimulateArgs, SourceArg};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let config = Config::from_env();
    let args = CliArgs::parse();

    match args.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
            Ok(())
        }
        Command::Simulate(opts) => {
            let scheduler_config = SchedulerConfig::new(config.simulation.worker_threads);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(scheduler_config.resolved_worker_threads())
                .enable_all()
                .build()
                .context("failed to build runtime")?;
            runtime.block_on(simulate(&config, scheduler_config, opts))
        }
    }
}

async fn simulate(config: &Config, scheduler_config: SchedulerConfig, opts: SimulateArgs) -> Result<()> {
    config.log_summary();

    let store = MemoryStore::new();
    let robot = store.save_robot(Robot::new("robot-001", "6-axis arm").with_joints(opts.joints))?;

    let dispatcher = Arc::new(build_dispatcher(config, opts.webhook_url.clone())?);
    let alarms: Arc<dyn AlarmStore> = Arc::new(store.clone());
    let correlator = Arc::new(AlarmCorrelator::new(alarms, Arc::clone(&dispatcher)));
    let detectors = Arc::new(DetectorRegistry::from_config(&config.detection));
    let pipeline = Arc::new(AnomalyPipeline::new(WindowStore::new(), detectors, correlator));

    let scheduler = RunScheduler::new(
        scheduler_config,
        Arc::new(store.clone()),
        pipeline,
        Arc::clone(&dispatcher),
        Arc::new(DataSourceCell::new(Arc::new(SyntheticSource::new()))),
    );

    if opts.source == SourceArg::Device {
        let device = DeviceSource::from_config(&config.device)
            .context("live device source is not configured")?;
        scheduler
            .switch_data_source(Arc::new(device))
            .await
            .context("failed to switch to the live device")?;
    }

    let rate_hz = opts.rate_hz.unwrap_or(config.simulation.default_rate_hz);
    let mut run = ScenarioRun::new("cli", RunMode::Live, rate_hz).for_robot(robot.id);
    if let Some(seed) = opts.seed {
        run = run.with_seed(seed);
    }
    let run = store.save_run(run)?;

    let origin = Utc::now();
    for spec in &opts.faults {
        let fault = store.save_fault(fault_from_spec(run.id, origin, spec))?;
        info!(
            fault = %fault.kind,
            start = %fault.start,
            end = %fault.end,
            "Fault scheduled"
        );
    }

    scheduler.start(run.id).await.context("failed to start run")?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(opts.duration_secs)) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, stopping run"),
    }
    let stopped = scheduler.stop(run.id).await?;
    info!(run_id = %run.id, status = %stopped.status, "Live run ended");

    if let Some(speed) = opts.replay_speed {
        if stopped.status == RunStatus::Stopped {
            scheduler
                .start_replay(run.id, speed)
                .await
                .context("failed to start replay")?;
            wait_until_settled(&scheduler, run.id).await?;
        } else {
            warn!(status = %stopped.status, "Run did not stop cleanly, skipping replay");
        }
    }

    scheduler.shutdown().await;

    let summary = summarize_run(&store, &store, run.id)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Log channel plus the webhook, if one is configured. A `--webhook-url`
/// flag overrides the configured URL and keeps the configured timeout.
fn build_dispatcher(config: &Config, webhook_url: Option<String>) -> Result<Dispatcher> {
    let mut notify = config.notify.clone();
    if webhook_url.is_some() {
        notify.webhook_url = webhook_url;
    }

    let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(webhook) =
        WebhookNotifier::from_config(&notify).context("invalid webhook configuration")?
    {
        info!(url = webhook.url(), timeout_ms = notify.webhook_timeout_ms, "Webhook notifications enabled");
        channels.push(Box::new(webhook));
    }
    Ok(Dispatcher::with_channels(channels))
}

fn fault_from_spec(
    run_id: armwatch_core::RunId,
    origin: chrono::DateTime<Utc>,
    spec: &FaultSpec,
) -> FaultInjection {
    let at = |secs: f64| origin + chrono::Duration::milliseconds((secs * 1000.0) as i64);
    let fault = FaultInjection::new(run_id, spec.kind, at(spec.start_secs), at(spec.end_secs));
    match spec.magnitude {
        Some(m) if spec.kind == FaultKind::SensorDrift => fault.with_param(PARAM_DRIFT_RATE, m),
        Some(m) => fault.with_param(PARAM_AMPLITUDE, m),
        None => fault,
    }
}

/// Poll until the replay leaves `RUNNING`.
async fn wait_until_settled(scheduler: &RunScheduler, run_id: armwatch_core::RunId) -> Result<()> {
    let mut poll = tokio::time::interval(Duration::from_millis(100));
    loop {
        poll.tick().await;
        let run = scheduler.status(run_id)?;
        if run.status != RunStatus::Running {
            info!(run_id = %run_id, status = %run.status, "Replay ended");
            return Ok(());
        }
    }
}
