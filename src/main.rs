use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_boot::boot::{BootOrchestrator, BootTrigger};
use edge_boot::config::AppConfig;
use edge_boot::gpio::{self, Bias, EdgeDetect};
use edge_boot::watcher::SignalWatcher;

/// Default env file, optional unless given with --env-file
const DEFAULT_ENV_FILE: &str = ".env";

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// edge-boot command line arguments
#[derive(Parser, Debug)]
#[command(name = "edge-boot")]
#[command(version, about = "Power on a server through its iDRAC when a GPIO line goes low", long_about = None)]
struct CliArgs {
    /// Env file with HTTP_HOST, IDRAC_* and GPIO_PIN (default: ./.env if present)
    #[arg(short = 'e', long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Run a single boot attempt immediately and exit, without touching GPIO
    #[arg(long)]
    boot_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose, args.log_format);

    tracing::info!("Starting edge-boot v{}", env!("CARGO_PKG_VERSION"));

    let (env_file, required) = match args.env_file {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    let config = AppConfig::load(&env_file, required)?;
    tracing::info!("Target: {:?}", config.target);
    tracing::debug!("Timeouts: {:?}", config.timeouts);

    let orchestrator = BootOrchestrator::from_config(&config.timeouts)?;
    let trigger = BootTrigger::new(orchestrator, config.target.clone());

    if args.boot_now {
        let outcome = trigger.run_once().await?;
        tracing::info!("Boot attempt finished: {}", outcome);
        return Ok(());
    }

    let line = gpio::lookup(&config.gpio_pin)?;
    line.log_info();
    let pin = line.configure_input(Bias::PullDown, EdgeDetect::Both)?;
    tracing::info!("Watching {} for falling edges", pin.description());
    let mut watcher = SignalWatcher::new(pin);

    tokio::select! {
        result = watcher.run(&trigger) => {
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("edge-boot stopped");
    Ok(())
}

/// Initialize logging with the CLI level, verbosity and format
fn init_logging(level: LogLevel, verbose_count: u8, format: LogFormat) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "edge_boot=error",
        LogLevel::Warn => "edge_boot=warn",
        LogLevel::Info => "edge_boot=info",
        LogLevel::Verbose => "edge_boot=debug,reqwest=info",
        LogLevel::Debug => "edge_boot=debug,reqwest=debug",
        LogLevel::Trace => "edge_boot=trace,reqwest=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
