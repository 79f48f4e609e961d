//! Serves the in-memory key-JSON store that the HTTP driver talks to.
//!
//! Usage: `ormlet-store [config.toml]`, defaulting to `ormlet.toml`. The bind
//! address comes from `store.bind` or `ORMLET_STORE__BIND`.

use std::sync::Arc;

use ormlet::server::{KeyStore, router};
use ormlet::settings::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "ormlet.toml".to_string());
    let settings = Settings::load(&path)?;
    let listener = tokio::net::TcpListener::bind(&settings.store.bind).await?;
    info!(address = %listener.local_addr()?, "key store listening");
    axum::serve(listener, router(Arc::new(KeyStore::new()))).await?;
    Ok(())
}
