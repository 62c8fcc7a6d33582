use clap::Parser;
use serial_handle_api::bridge;
use serial_handle_api::{logging, ConfigLoader, SerialApi};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Connection-handle based serial port API.",
    long_about = "Serves a JSON-lines command bridge on stdin/stdout: open ports to get a connection id, then read, write, flush and close through it. Logs go to stderr."
)]
struct Args {
    /// Configuration file. Defaults to the standard search locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `serial_handle_api=trace`. Overrides the config.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the available ports, one per line, and exit.
    #[arg(long)]
    list: bool,

    /// Write the effective configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

/// Errors from config loading, logging setup and config saving all convert into this.
type MainResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> MainResult {
    let args = Args::parse();

    let (loader, load_error) = match &args.config {
        Some(path) => (ConfigLoader::load_from(path)?, None),
        None => match ConfigLoader::load() {
            Ok(loader) => (loader, None),
            Err(e) => (ConfigLoader::with_defaults(), Some(e)),
        },
    };

    logging::init(&loader.config().logging, args.log_level.as_deref())?;
    if let Some(e) = load_error {
        warn!("Falling back to default configuration: {}", e);
    }
    if let Some(path) = &loader.config_path {
        info!(path = %path.display(), "loaded configuration");
    }

    if let Some(path) = &args.write_default_config {
        loader.save_to(path)?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let api = Arc::new(SerialApi::system(&loader.config().serial));

    if args.list {
        for port in api.get_ports().await {
            println!("{}", port);
        }
        return Ok(());
    }

    info!("serial bridge ready on stdin/stdout");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = bridge::run_bridge(Arc::clone(&api), stdin, stdout) => {
            if let Err(e) = result {
                error!("Bridge I/O failed: {}", e);
            }
        }
        _ = shutdown_signal() => {}
    }

    api.shutdown().await;
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown...");
}
