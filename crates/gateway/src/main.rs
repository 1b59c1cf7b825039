//! CANSPY Gateway - Main Entry Point

use std::path::PathBuf;

use gateway::{init_logging, Gateway, GatewayConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = GatewayConfig::load(config_path.as_deref())?;
    init_logging(&config.log)?;

    info!("=== CANSPY Gateway v{} ===", env!("CARGO_PKG_VERSION"));
    Gateway::new(config).run().await?;

    Ok(())
}
