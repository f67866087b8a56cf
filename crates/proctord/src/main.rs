use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::{ProctorService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("proctord starting");

    let config = Config::from_env();
    let rules = config
        .load_rules()
        .context("failed to load indicator rules")?;
    let engine = engine::spawn_engine(&config, rules)?;

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, ProctorService { engine })?
        .build()
        .await
        .with_context(|| format!("failed to register {BUS_NAME} on D-Bus"))?;

    tracing::info!(
        bus = if config.session_bus { "session" } else { "system" },
        refresh_hz = config.refresh_hz,
        "proctord ready"
    );

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("proctord shutting down");

    Ok(())
}
