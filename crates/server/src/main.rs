//! Renfound server binary.

use renfound_server::{Settings, logging, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    logging::init(&settings.logger)?;

    tracing::info!("starting Renfound server v{}", env!("CARGO_PKG_VERSION"));

    run_server(settings).await?;

    Ok(())
}
