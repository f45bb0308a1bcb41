//! `lss` — the libstor driver server.
//!
//! Hosts exactly one storage driver for the lifetime of the process:
//!
//! ```text
//! lss <driver> [--bind <addr>] [--config <path>]
//! ```
//!
//! Startup failures (unknown driver, bad configuration, bind failure) are
//! fatal: the message is printed as `lss: error: <message>` and the process
//! exits 1.  Once serving, the process runs until a termination signal
//! arrives, at which point every outstanding session is force-closed before
//! exit.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;

use libstor::config::ServerConfig;
use libstor::error::StorError;
use libstor::registry;
use libstor::tls;
use libstor::transport::server::StorServer;

#[derive(Parser, Debug)]
#[command(name = "lss", about = "libstor driver server")]
struct Args {
    /// Name of the driver to host (block, nas, object).
    driver: Option<String>,

    /// Path to a JSON server configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address override, host:port.
    #[arg(short, long)]
    bind: Option<String>,
}

fn program_name() -> String {
    std::env::args().next().unwrap_or_else(|| "lss".to_owned())
}

fn fatal(err: &StorError) -> ! {
    eprintln!("{}: error: {err}", program_name());
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let Some(driver_name) = args.driver else {
        eprintln!(
            "usage: {} <driver> [--bind <addr>] [--config <path>]",
            program_name()
        );
        eprintln!(
            "drivers: {}",
            registry::driver_names().collect::<Vec<_>>().join(", ")
        );
        process::exit(1);
    };

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path).unwrap_or_else(|e| fatal(&e)),
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    if let Err(e) = run(&driver_name, &config).await {
        fatal(&e);
    }
}

async fn run(driver_name: &str, config: &ServerConfig) -> Result<(), StorError> {
    let driver = registry::new_driver(driver_name, config)?;

    let identity = tls::generate_identity(&config.server_name)?;
    let cert_path = config.cert_path();
    std::fs::write(&cert_path, identity.cert_der.as_ref())
        .map_err(|e| StorError::Config(format!("write {}: {e}", cert_path.display())))?;
    info!(path = %cert_path.display(), "wrote server certificate");

    let addr = config
        .bind
        .parse()
        .map_err(|e| StorError::Config(format!("bind {}: {e}", config.bind)))?;
    let server = StorServer::bind(addr, tls::server_config(&identity)?, driver)?;
    server.close_on_abort()?;
    server.serve().await
}
