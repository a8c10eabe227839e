//! ClinicQ Server Binary
//!
//! Starts the TCP server for ClinicQ.

use std::sync::Arc;

use clap::Parser;
use clinicq::network::Server;
use clinicq::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// ClinicQ Server
#[derive(Parser, Debug)]
#[command(name = "clinicq-server")]
#[command(about = "Queue, PIN and routing engine for a walk-in examination center")]
#[command(version)]
struct Args {
    /// Data directory (omit to keep state in memory)
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7411")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Service time zone as a UTC offset in minutes
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    utc_offset_minutes: i32,

    /// Reject queue entries without a valid PIN
    #[arg(long)]
    require_pin: bool,

    /// Lock acquisition timeout in milliseconds
    #[arg(long, default_value = "2000")]
    lock_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,clinicq=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ClinicQ Server v{}", clinicq::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.as_deref().unwrap_or("<memory>"));
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let mut builder = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .service_utc_offset_secs(args.utc_offset_minutes * 60)
        .require_pin(args.require_pin)
        .lock_timeout_ms(args.lock_timeout_ms);
    if let Some(dir) = &args.data_dir {
        builder = builder.data_dir(dir);
    }
    let config = builder.build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(config, engine) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
