use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::persistance::database::Database;

mod config;
mod error;
mod fingerprint;
mod models;
mod persistance;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let database = Database::init(&config.database_url).await?;
    let app = routes::router(Arc::new(database));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
