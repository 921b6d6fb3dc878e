mod command;
mod config;
mod control;
mod daemon;
mod device;
mod server;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use config::{DriverBackend, ServerConfig};
use daemon::PidFile;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Control server for the LED, buzzer, seven-segment display and light sensor
#[derive(Parser, Debug)]
#[command(name = "iot-server", version, about)]
struct Cli {
    /// Run in the background and log to the configured log file
    #[arg(short, long)]
    daemon: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listening port (overrides the configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Use simulated devices instead of GPIO
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listen_addr.set_port(port);
    }
    if cli.simulate {
        config.driver = DriverBackend::Simulated;
    }
    config.validate()?;

    // Detach before any thread exists; only the forking thread survives
    if cli.daemon {
        if let Some(pid) = daemon::ensure_not_running(&config.daemon.pid_file)? {
            eprintln!("Warning: replacing stale PID file (PID {} is gone)", pid);
        }
        println!("Starting in background, logging to {}", config.daemon.log_file.display());
        println!("  Stop: kill $(cat {})", config.daemon.pid_file.display());
        daemon::detach()?;
    }

    let log_file = cli.daemon.then_some(config.daemon.log_file.as_path());
    let _log_guard = init_logging(log_file)?;

    let _pid_file = if cli.daemon {
        let pid_file = PidFile::acquire(&config.daemon.pid_file)?;
        info!("[DAEMON] Running in background (PID file {})", pid_file.path().display());
        Some(pid_file)
    } else {
        None
    };

    info!("IoT device server starting");
    info!("  Listen: {}", config.listen_addr);
    info!("  Devices: {:?}", config.driver);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(server::run(config))
}

/// Log to stdout, or to `log_file` when running in the background
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path.file_name().context("log file path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(Some(guard))
}
