//! Settlement netting simulator CLI
//!
//! Loads a run configuration and a trade-event feed (JSON lines or a seeded
//! synthetic day), runs the broker population and writes the run report
//! and, optionally, the settlement-obligation records.

use anyhow::{bail, Context, Result};
use clap::Parser;
use netting_simulator_core::source::{JsonLinesSource, SyntheticConfig, SyntheticSource, TradeSource};
use netting_simulator_core::{InvalidEventPolicy, RunReport, Simulation, SimulationConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Broker settlement-bucket netting simulation
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON simulation config (defaults apply to missing fields)
    #[arg(long, env = "NETTING_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Trade events, one JSON object per line
    #[arg(long, conflicts_with = "synthetic")]
    events: Option<PathBuf>,

    /// Generate this many synthetic trades instead of reading a feed
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for the synthetic feed
    #[arg(long, default_value = "42")]
    synthetic_seed: u64,

    /// Override the number of brokers
    #[arg(long)]
    brokers: Option<usize>,

    /// Override the run seed
    #[arg(long)]
    seed: Option<u64>,

    /// Skip out-of-domain or malformed events instead of failing the broker
    #[arg(long)]
    skip_invalid: bool,

    /// Process brokers on one thread
    #[arg(long)]
    sequential: bool,

    /// Report destination (stdout when omitted)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Include every broker's final bucket maps in the report
    #[arg(long)]
    include_brokers: bool,

    /// Write settlement-obligation records to this JSON file
    #[arg(long)]
    obligations: Option<PathBuf>,

    /// Clearing price stamped on obligation records (cents)
    #[arg(long, default_value = "17000")]
    clearing_price: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let simulation = Simulation::new(config).context("invalid simulation config")?;

    let mut source = open_source(&args)?;
    let outcome = simulation
        .run_source(source.as_mut())
        .context("simulation run failed")?;

    let report = RunReport::new(simulation.config(), &outcome, args.include_brokers)?;
    let json = report.to_json_pretty()?;
    match &args.report {
        Some(path) => write_file(path, json.as_bytes())?,
        None => println!("{}", json),
    }

    if let Some(path) = &args.obligations {
        let records = outcome.obligations(args.clearing_price);
        let json = serde_json::to_vec(&records).context("serializing obligations")?;
        write_file(path, &json)?;
        info!(records = records.len(), path = %path.display(), "wrote settlement obligations");
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(brokers) = args.brokers {
        config.num_brokers = brokers;
    }
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    if args.skip_invalid {
        config.invalid_events = InvalidEventPolicy::Skip;
    }
    if args.sequential {
        config.force_sequential = true;
    }
    Ok(config)
}

fn open_source(args: &Args) -> Result<Box<dyn TradeSource>> {
    match (&args.events, args.synthetic) {
        (Some(path), _) => {
            let file = File::open(path)
                .with_context(|| format!("opening events {}", path.display()))?;
            Ok(Box::new(JsonLinesSource::new(BufReader::new(file))))
        }
        (None, Some(num_events)) => {
            let synthetic = SyntheticConfig {
                num_events,
                seed: args.synthetic_seed,
                ..Default::default()
            };
            Ok(Box::new(SyntheticSource::new(&synthetic)?))
        }
        (None, None) => bail!("either --events or --synthetic is required"),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
