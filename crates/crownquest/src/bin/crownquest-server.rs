//! Runs the Crown Quest relay with settings from the environment.

use crownquest::{CrownQuestError, CrownQuestServerBuilder, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CrownQuestError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(ws = %config.ws_addr, http = %config.http_addr, "starting Crown Quest");

    let server = CrownQuestServerBuilder::from_config(config).build().await?;
    server.run().await
}
