//! vsock-latency entry point.
//!
//! Runs one side of the latency benchmark: the responder listens for a
//! single peer and answers each request, the initiator connects and times
//! each exchange. Samples are in raw cycle-counter units.

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use latency_common::config::{BenchConfig, ReportFormat, TransportKind};
use latency_common::state::{ProtocolVariant, Role};
use latency_common::time::ClockOffset;
use latency_engine::clock::Tsc;
use latency_engine::pinning::apply_pinning;
use latency_engine::protocol::{run_initiator, run_responder, RunParameters, SampleSet};
use latency_transport::{connect, listen, PeerAddress};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::report::{render, RunReport};

/// Environment variable naming a configuration file.
const CONFIG_ENV: &str = "VSOCK_LATENCY_CONFIG";

/// vsock-latency command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "vsock-latency",
    about = "Cycle-accurate latency benchmark for vsock, Unix, and TCP sockets",
    version,
    long_about = None
)]
struct Args {
    /// Path to a benchmark configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// Transport (vsock, unix, tcp).
    #[arg(long, short = 't', global = true)]
    transport: Option<TransportKind>,

    /// Protocol variant (round-trip, one-way). Both sides must agree.
    #[arg(long, global = true)]
    variant: Option<ProtocolVariant>,

    /// Number of exchanges, including the initial one.
    #[arg(long, short = 'n', global = true)]
    iterations: Option<usize>,

    /// Request payload size in bytes.
    #[arg(long, value_name = "BYTES", global = true)]
    request_size: Option<usize>,

    /// Report format (text, json).
    #[arg(long, short = 'f', global = true)]
    format: Option<ReportFormat>,

    /// Pin the process to this CPU.
    #[arg(long, value_name = "N", global = true)]
    cpu: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Listen for one initiator and answer its requests.
    #[command(visible_alias = "server")]
    Responder {
        /// Cycles added to each one-way sample to align the initiator's
        /// clock with ours (overrides the config file).
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<ClockOffset>,
    },
    /// Connect to a responder and time each exchange.
    #[command(visible_alias = "client")]
    Initiator {
        /// Responder address: a context id (vsock), socket path (unix), or
        /// IP literal (tcp).
        peer: String,
    },
}

impl Command {
    fn role(&self) -> Role {
        match self {
            Self::Responder { .. } => Role::Responder,
            Self::Initiator { .. } => Role::Initiator,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), role = %args.command.role(), "Starting vsock-latency");

    // Load configuration
    let mut config = load_config(args.config.as_deref())?;

    // Override with command-line arguments
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    info!(
        transport = %config.transport.kind,
        variant = %config.variant,
        iterations = config.iterations,
        request_size = config.request_size,
        "Configuration loaded"
    );

    apply_pinning(&config.pinning).context("Failed to apply process pinning")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&config, &args.command, &mut out)
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr so stdout carries only the report.
fn init_logging(level: &str) {
    let filter = format!(
        "vsock_latency={level},latency_engine={level},latency_transport={level},latency_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `VSOCK_LATENCY_CONFIG` environment variable
/// 3. `/etc/vsock-latency/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(explicit: Option<&Path>) -> Result<BenchConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = explicit {
        info!(?config_path, "Loading config from command-line argument");
        return BenchConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from {CONFIG_ENV}");
            return BenchConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {CONFIG_ENV}={env_path:?}"));
        }
        warn!(
            path = %env_path,
            "{CONFIG_ENV} set but file does not exist, checking other locations"
        );
    }

    // 3. System path, then 4. local development path
    for candidate in ["/etc/vsock-latency/config.toml", "config/default.toml"] {
        let config_path = Path::new(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return BenchConfig::from_file(config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(BenchConfig::default())
}

fn apply_overrides(config: &mut BenchConfig, args: &Args) {
    if let Some(kind) = args.transport {
        config.transport.kind = kind;
    }
    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(request_size) = args.request_size {
        config.request_size = request_size;
    }
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if let Some(cpu) = args.cpu {
        config.pinning.cpu_affinity = Some(cpu);
    }
    if let Command::Responder {
        offset: Some(offset),
    } = args.command
    {
        config.offset = offset;
    }
}

/// Establish the channel, run the exchange, and print the report.
///
/// Nothing is written to `out` unless every iteration succeeded.
fn run<W: Write>(config: &BenchConfig, command: &Command, out: &mut W) -> Result<()> {
    let samples = measure(config, command)?;

    let summary = samples
        .summarize(&config.report.percentiles)
        .context("Too few samples to summarize")?;
    info!(
        min = summary.min,
        median = summary.median,
        max = summary.max,
        jitter = summary.jitter(),
        "Run complete"
    );

    let report = RunReport {
        role: samples.role(),
        transport: config.transport.kind,
        variant: config.variant,
        iterations: samples.len(),
        samples: samples.as_slice(),
        summary,
    };
    render(out, config.report.format, &report).context("Failed to write report")
}

fn measure(config: &BenchConfig, command: &Command) -> Result<SampleSet> {
    let params = RunParameters::from_config(config);
    let mut clock = Tsc;
    info!(clock = clock.name(), "Using cycle counter");

    match command {
        Command::Responder { .. } => {
            let acceptor = listen(&config.transport).context("Failed to open listener")?;
            let mut channel = acceptor
                .accept_one()
                .context("Failed to accept initiator")?;
            run_responder(channel.as_mut(), &mut clock, &params, config.offset)
                .context("Responder run failed")
        }
        Command::Initiator { peer } => {
            let peer = PeerAddress::parse(config.transport.kind, peer)
                .context("Invalid peer address")?;
            let mut channel =
                connect(&peer, &config.transport).context("Failed to connect to responder")?;
            run_initiator(channel.as_mut(), &mut clock, &params).context("Initiator run failed")
        }
    }
}
