use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use armwatch_core::FaultKind;

/// Industrial-robot telemetry simulator with anomaly detection and alarms.
#[derive(Parser, Debug)]
#[command(name = "armwatch", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a live simulation, optionally replay it, and print a run summary.
    Simulate(SimulateArgs),
    /// Print the resolved configuration with secrets removed.
    Config,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// How long the live run generates samples.
    #[arg(long, default_value_t = 30)]
    pub duration_secs: u64,

    /// Sampling rate; defaults to SIM_RATE_HZ.
    #[arg(long)]
    pub rate_hz: Option<u32>,

    /// Seed for reproducible synthetic data; defaults to the wall clock.
    #[arg(long, env = "ARMWATCH_SEED")]
    pub seed: Option<u64>,

    /// Number of joints on the simulated robot.
    #[arg(long, default_value_t = armwatch_core::DEFAULT_JOINT_COUNT)]
    pub joints: u32,

    /// Fault injection as KIND@START..END[:AMPLITUDE], seconds from run start.
    /// May be repeated, e.g. `--fault overheat@5..20:25`.
    #[arg(long = "fault")]
    pub faults: Vec<FaultSpec>,

    /// Replay the recorded run at this speed once live generation stops.
    #[arg(long)]
    pub replay_speed: Option<f64>,

    /// Where samples come from.
    #[arg(long, value_enum, default_value_t = SourceArg::Synthetic)]
    pub source: SourceArg,

    /// Webhook receiving run, sample and alarm pushes; defaults to NOTIFY_WEBHOOK_URL.
    #[arg(long)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Synthetic,
    Device,
}

/// Parsed `--fault` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultSpec {
    pub kind: FaultKind,
    pub start_secs: f64,
    pub end_secs: f64,
    /// Amplitude, or drift rate for sensor drift.
    pub magnitude: Option<f64>,
}

impl FromStr for FaultSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once('@')
            .ok_or_else(|| format!("expected KIND@START..END, got '{s}'"))?;
        let kind: FaultKind = kind.parse()?;

        let (range, magnitude) = match rest.split_once(':') {
            Some((range, m)) => {
                let m: f64 = m
                    .parse()
                    .map_err(|_| format!("invalid amplitude '{m}'"))?;
                (range, Some(m))
            }
            None => (rest, None),
        };

        let (start, end) = range
            .split_once("..")
            .ok_or_else(|| format!("expected START..END, got '{range}'"))?;
        let start_secs: f64 = start
            .parse()
            .map_err(|_| format!("invalid start '{start}'"))?;
        let end_secs: f64 = end.parse().map_err(|_| format!("invalid end '{end}'"))?;

        if !(start_secs >= 0.0 && end_secs > start_secs && end_secs.is_finite()) {
            return Err(format!("fault window must satisfy 0 <= start < end, got {start_secs}..{end_secs}"));
        }

        Ok(Self {
            kind,
            start_secs,
            end_secs,
            magnitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fault_with_amplitude() {
        let spec: FaultSpec = "overheat@5..20:25".parse().unwrap();
        assert_eq!(spec.kind, FaultKind::Overheat);
        assert_eq!(spec.start_secs, 5.0);
        assert_eq!(spec.end_secs, 20.0);
        assert_eq!(spec.magnitude, Some(25.0));
    }

    #[test]
    fn parses_fault_without_amplitude() {
        let spec: FaultSpec = "sensor-drift@0.5..3".parse().unwrap();
        assert_eq!(spec.kind, FaultKind::SensorDrift);
        assert_eq!(spec.magnitude, None);
    }

    #[test]
    fn rejects_malformed_faults() {
        assert!("overheat".parse::<FaultSpec>().is_err());
        assert!("overheat@5".parse::<FaultSpec>().is_err());
        assert!("overheat@9..3".parse::<FaultSpec>().is_err());
        assert!("meltdown@1..2".parse::<FaultSpec>().is_err());
        assert!("overheat@1..2:loud".parse::<FaultSpec>().is_err());
    }

    #[test]
    fn parses_simulate_command() {
        let args = CliArgs::try_parse_from([
            "armwatch",
            "simulate",
            "--duration-secs",
            "5",
            "--rate-hz",
            "10",
            "--fault",
            "high_vibration@1..4",
            "--fault",
            "current-spike@2..3:4.5",
            "--replay-speed",
            "2",
        ])
        .unwrap();
        match args.command {
            Command::Simulate(sim) => {
                assert_eq!(sim.duration_secs, 5);
                assert_eq!(sim.rate_hz, Some(10));
                assert_eq!(sim.faults.len(), 2);
                assert_eq!(sim.replay_speed, Some(2.0));
                assert_eq!(sim.source, SourceArg::Synthetic);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
