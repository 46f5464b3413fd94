//! ZP Records daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 3000, data in the platform data dir)
//! zp-records
//!
//! # Custom config and data directory
//! zp-records --config /etc/zp-records/config.toml --data-dir /var/lib/zp-records
//!
//! # Production: a real secret is mandatory
//! JWT_SECRET=... zp-records --production
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zp_records::services::events::spawn_logging_listener;
use zp_records::{Config, HttpServer, JwtValidator, RecordsDb, Services};

#[derive(Parser, Debug)]
#[command(name = "zp-records")]
#[command(about = "Project records and progress tracking API")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (database and config)
    #[arg(long, env = "RECORDS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Secret for signing and verifying tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Production mode
    #[arg(long, env = "PRODUCTION")]
    production: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zp_records=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(addr) = args.bind_address {
        config.bind_address = addr;
    }
    if args.jwt_secret.is_some() {
        config.jwt_secret = args.jwt_secret;
    }
    config.production |= args.production;

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        production = config.production,
        "Starting zp-records"
    );

    tokio::fs::create_dir_all(&config.data_dir).await?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let jwt = match config.jwt_secret.clone() {
        Some(secret) => JwtValidator::new(secret, config.jwt_expiry_secs)?,
        None if config.production => {
            anyhow::bail!("JWT_SECRET is required in production mode");
        }
        None => {
            warn!("No JWT secret configured, using development secret");
            JwtValidator::new_dev()
        }
    };

    let db = Arc::new(RecordsDb::open(&config.data_dir)?);
    let stats = db.stats()?;
    info!(
        projects = stats.project_count,
        progress_entries = stats.progress_log_count,
        "Database ready"
    );

    let services = Arc::new(Services::new(db));
    let _audit = spawn_logging_listener(services.events.clone());

    let addr = config.socket_addr()?;
    let server = Arc::new(
        HttpServer::new(services, Arc::new(jwt), addr).with_production(config.production),
    );

    info!("HTTP API available at http://{}/api", addr);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
