//! The persistence contract every backend implements, and the process-wide
//! slot holding the driver that resources use when none is passed explicitly.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use lazy_static::lazy_static;
use tracing::{info, warn};

use crate::datatype::{Properties, Value};
use crate::descriptor::ResourceDescriptor;
use crate::error::{OrmletError, Result};
use crate::query::Query;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Provisions storage for the resource. Calling it again is harmless.
    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<()>;

    /// Inserts or replaces the record by primary key and returns the key as stored.
    async fn save(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Value>;

    /// Deletes the record carrying the same primary key as `properties`.
    async fn remove(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<()>;

    /// Reads the record carrying the same primary key as `properties`, failing
    /// with [`OrmletError::NotFound`] when there is none.
    async fn find(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Properties>;

    /// Reads every record that satisfies all filters of `query`.
    async fn find_all(&self, descriptor: &ResourceDescriptor, query: &Query) -> Result<Vec<Properties>>;
}

lazy_static! {
    static ref INSTALLED: RwLock<Option<Arc<dyn Driver>>> = RwLock::new(None);
}

/// Installs the driver used by resource operations that are not given one.
/// Meant to be called once at start-up; a second call replaces the first.
pub fn use_driver(driver: Arc<dyn Driver>) {
    let name = driver.name();
    let previous = INSTALLED.write().unwrap_or_else(PoisonError::into_inner).replace(driver);
    match previous {
        Some(previous) => warn!(driver = name, previous = previous.name(), "replacing installed driver"),
        None => info!(driver = name, "driver installed"),
    }
}

pub fn installed_driver() -> Result<Arc<dyn Driver>> {
    INSTALLED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(OrmletError::NoDriver)
}
