use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hype_gauge::config::AppConfig;
use hype_gauge::server::{self, AppState};
use hype_gauge::{Emitter, HypeGauge, LocalChannelHub};

#[derive(Parser, Debug)]
#[command(name = "hype-gauge", version, about = "Live-event hype gauge")]
struct Args {
    /// Path to the JSON config file (created with defaults if missing)
    #[arg(long, default_value = "hype-gauge.json")]
    config: PathBuf,

    /// Listen port, overrides config and HYPE_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // init tracing from env HYPE_LOG or RUST_LOG
    let filter = std::env::var("HYPE_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();

    let mut config = AppConfig::load_or_create(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    config.apply_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let hub = Arc::new(LocalChannelHub::new());
    let gauge = Arc::new(HypeGauge::start(config.gauge.clone(), &*hub)?);
    let emitter = Arc::new(Emitter::new(&config.gauge, gauge.reader(), hub.clone()));
    info!(user_id = emitter.user_id(), "Local participant ready");

    let maintenance = server::spawn_hub_maintenance(hub.clone(), Duration::from_secs(30));

    let state = AppState {
        gauge: gauge.clone(),
        emitter,
        hub: hub.clone(),
    };
    let app = server::build_router(state, config.server.cors_any);

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    info!(listen = %addr, "Hype gauge listening");

    server::serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await?;

    // subscription and ticker stop before the hub goes away
    gauge.shutdown().await;
    hub.close();
    maintenance.abort();

    Ok(())
}
