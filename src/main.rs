//! Phone Home - PinePhone Pro Telemetry Agent Binary
//!
//! Runs the tiered collection pipeline against a remote collector, or
//! takes one-shot snapshots for inspection.

use clap::{Args, Parser, Subcommand};
use phonehome::{AgentConfig, Aggregator, Scheduler, Transporter};
use sysinfo::System;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "phonehome")]
#[command(about = "📡 Phone Home - PinePhone Pro Telemetry Agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "A tiered hardware telemetry agent that samples PinePhone Pro state and reports it to a remote collector"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent (default)
    Run(RunArgs),

    /// Capture one full snapshot as JSON and exit
    Snapshot(SnapshotArgs),

    /// Show device and configuration information
    Info,
}

#[derive(Args)]
struct RunArgs {
    /// Log envelopes instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;
    print_banner();

    match &cli.command {
        Some(Commands::Run(args)) => run_command(args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(args).await?,
        Some(Commands::Info) => info_command().await?,
        None => run_command(&RunArgs { dry_run: false }).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else {
        std::env::var("LOG_LEVEL")
            .map(|raw| parse_level(&raw))
            .unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn parse_level(raw: &str) -> Level {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn print_banner() {
    println!("📡 Phone Home - PinePhone Pro Telemetry Agent");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

async fn run_command(args: &RunArgs) -> anyhow::Result<()> {
    info!("Starting telemetry agent...");

    let mut config = AgentConfig::from_env();
    if args.dry_run {
        config.dry_run = true;
    }
    config.validate()?;

    info!("Device ID: {}", config.device_id);
    info!("Collector: {}", config.server_url);
    info!(
        "Intervals: high {}ms, medium {}ms, low {}ms",
        config.intervals.high_ms, config.intervals.medium_ms, config.intervals.low_ms
    );
    if config.dry_run {
        info!("Dry run: envelopes are logged, never sent");
    }

    let transporter = Transporter::new(&config)?;
    transporter.check_health().await;

    let aggregator = Aggregator::new(&config);
    let mut scheduler = Scheduler::new(&config, aggregator, transporter);
    scheduler.start().await;

    shutdown_signal().await?;
    info!("Shutdown signal received, stopping...");
    scheduler.stop();

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn snapshot_command(args: &SnapshotArgs) -> anyhow::Result<()> {
    let config = AgentConfig::from_env();
    let aggregator = Aggregator::new(&config);
    let snapshot = aggregator.collect_full(&config.device_id).await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", json);

    Ok(())
}

async fn info_command() -> anyhow::Result<()> {
    let config = AgentConfig::from_env();

    println!("📡 Phone Home Device Information");
    println!("================================");
    println!();

    println!("Device:");
    println!("  Device ID: {}", config.device_id);
    println!(
        "  Hostname: {}",
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "  OS: {} {}",
        System::name().unwrap_or_else(|| "unknown".to_string()),
        System::os_version().unwrap_or_default()
    );
    println!(
        "  Kernel: {}",
        System::kernel_version().unwrap_or_else(|| "unknown".to_string())
    );
    println!();

    println!("Collection:");
    println!("  High tier: every {}ms", config.intervals.high_ms);
    println!("  Medium tier: every {}ms", config.intervals.medium_ms);
    println!("  Low tier: every {}ms", config.intervals.low_ms);
    println!("  Process list cap: {}", config.max_processes);
    println!();

    println!("Delivery:");
    println!("  Collector: {}", config.server_url);
    println!(
        "  API key: {}",
        if config.api_key.is_empty() {
            "not set"
        } else {
            "set"
        }
    );
    println!(
        "  Retries: {} attempts, {}ms base backoff, {}ms timeout",
        config.delivery.retry_count, config.delivery.retry_delay_ms, config.delivery.timeout_ms
    );
    println!(
        "  Offline buffer: {} (max {} entries)",
        if config.buffer.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.buffer.max_size
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["phonehome", "run", "--dry-run"]).unwrap();
        match cli.command {
            Some(Commands::Run(args)) => assert!(args.dry_run),
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_default_command_is_run() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["phonehome"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_debug_flag_is_global() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["phonehome", "snapshot", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Some(Commands::Snapshot(_))));
    }

    #[test]
    fn test_parse_level_spellings() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }
}
