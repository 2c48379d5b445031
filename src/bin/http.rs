use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use household_chores::{BoardRegistry, ServiceConfig, http_api};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HTTP_ADDR_ENV: &str = "HOUSEHOLD_CHORES_HTTP_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("household_chores=info")),
        )
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let addr: SocketAddr = std::env::var(HTTP_ADDR_ENV)
        .unwrap_or_else(|_| config.server.bind.clone())
        .parse()
        .context("parsing bind address")?;

    let registry = Arc::new(BoardRegistry::new(
        config.storage.open().context("opening storage")?,
        config.schedule.rotation_plan()?,
        config.schedule.refresh_interval()?,
        config.maintenance.schedule()?,
    ));
    for household in &config.households {
        registry.add_household(household)?;
    }
    info!(
        "serving {} household(s) from {:?} storage",
        config.households.len(),
        config.storage.backend
    );

    http_api::serve(addr, registry).await?;
    Ok(())
}
