//! Weapon Detection Alerts - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    info!("=== Weapon Detection Alerts v{} ===", env!("CARGO_PKG_VERSION"));

    run_server(config).await
}
