//! Layered configuration: an optional TOML file, overridden by environment
//! variables such as `ORMLET_DRIVER=http` or `ORMLET_HTTP__BASE_URL=...`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::info;

use crate::driver::Driver;
use crate::error::{OrmletError, Result};
use crate::persist::SqliteDriver;
use crate::remote::HttpDriver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SqliteSettings {
    /// Database file; in-memory when absent.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { base_url: "http://127.0.0.1:7878".to_string(), timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub bind: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:7878".to_string() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub driver: DriverKind,
    pub sqlite: SqliteSettings,
    pub http: HttpSettings,
    pub store: StoreSettings,
}

impl Settings {
    /// Reads `path` if it exists, then applies `ORMLET_*` variables on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("ORMLET").prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }

    /// Builds the configured driver.
    pub fn connect(&self) -> Result<Arc<dyn Driver>> {
        let driver: Arc<dyn Driver> = match self.driver {
            DriverKind::Sqlite => match &self.sqlite.path {
                Some(path) if path.is_empty() => {
                    return Err(OrmletError::Config("sqlite.path must not be empty".to_string()));
                }
                Some(path) => Arc::new(SqliteDriver::open(path)?),
                None => Arc::new(SqliteDriver::open_in_memory()?),
            },
            DriverKind::Http => {
                let timeout = Duration::from_millis(self.http.timeout_ms);
                Arc::new(HttpDriver::with_timeout(&self.http.base_url, timeout)?)
            }
        };
        info!(driver = driver.name(), "connected");
        Ok(driver)
    }
}
