//! HTTP driver for a remote key-JSON store.
//!
//! Records are JSON objects stored under `{base}/{resource}/{key}`; a `GET`
//! on `{base}/{resource}` lists every object of a resource as `{key: object}`.
//! The store knows nothing about columns or filters, so queries are
//! evaluated here, after the listing has been fetched.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::datatype::{Properties, Value};
use crate::descriptor::ResourceDescriptor;
use crate::driver::Driver;
use crate::error::{Operation, OrmletError, Result};
use crate::query::Query;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands out numeric keys for records saved without one: the current time in
/// milliseconds, bumped when needed so keys never repeat within the process.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    last: AtomicI64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn generate(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

pub struct HttpDriver {
    base_url: String,
    client: Client,
    keys: KeyGenerator,
}

impl HttpDriver {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            keys: KeyGenerator::new(),
        })
    }
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, descriptor: &ResourceDescriptor) -> String {
        format!("{}/{}", self.base_url, descriptor.name())
    }
    fn item_url(&self, descriptor: &ResourceDescriptor, key: &Value) -> String {
        format!("{}/{}/{}", self.base_url, descriptor.name(), key)
    }

    async fn store(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Value> {
        let key = match descriptor.primary_value(properties)? {
            Some(key) => key,
            None => Value::from(self.keys.generate()),
        };
        let values = descriptor.row_values(properties)?;
        let mut body = Map::new();
        for (column, value) in descriptor.fields().iter().zip(values) {
            let value = if column.primary { key.clone() } else { value };
            body.insert(column.name.clone(), column.column_type.to_json(&value)?);
        }
        let url = self.item_url(descriptor, &key);
        debug!(%url, "storing item");
        let response = self.client.put(&url).json(&Json::Object(body)).send().await?;
        ensure_success(response).await?;
        Ok(key)
    }

    async fn delete(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<()> {
        let key = descriptor.key_of(properties)?;
        let url = self.item_url(descriptor, &key);
        debug!(%url, "removing item");
        let response = self.client.delete(&url).send().await?;
        // removing something that is already gone is not an error
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Properties> {
        let key = descriptor.key_of(properties)?;
        let not_found = || OrmletError::NotFound { resource: descriptor.name().to_string(), key: key.to_string() };
        let url = self.item_url(descriptor, &key);
        debug!(%url, "fetching item");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        match ensure_success(response).await?.json::<Json>().await? {
            Json::Object(object) => read_object(descriptor, Some(&key), &object),
            Json::Null => Err(not_found()),
            other => Err(OrmletError::Serialization(format!("expected an object, got {}", other))),
        }
    }

    async fn fetch_all(&self, descriptor: &ResourceDescriptor, query: &Query) -> Result<Vec<Properties>> {
        let bound = query.bind(descriptor)?;
        let url = self.collection_url(descriptor);
        debug!(%url, filters = bound.filters().len(), "fetching items");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let listing = ensure_success(response).await?.json::<Json>().await?;
        let mut found = Vec::new();
        let mut keep = |properties: Properties| {
            if bound.matches(&properties) {
                found.push(properties);
            }
        };
        match listing {
            Json::Null => (),
            Json::Object(entries) => {
                for (key, entry) in entries {
                    let key = Value::Text(key);
                    keep(read_object(descriptor, Some(&key), expect_object(&entry)?)?);
                }
            }
            Json::Array(entries) => {
                for entry in entries {
                    keep(read_object(descriptor, None, expect_object(&entry)?)?);
                }
            }
            other => return Err(OrmletError::Serialization(format!("expected a listing, got {}", other))),
        }
        // the same order SQL backends use
        let primary = descriptor.primary().name.as_str();
        found.sort_by(|a, b| {
            let (a, b) = (a.get(primary), b.get(primary));
            a.zip(b)
                .and_then(|(a, b)| a.compare(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(found)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let text = response.text().await.unwrap_or_else(|_| "no response body".to_string());
    Err(OrmletError::Transport(format!("HTTP {} from {}: {}", status, url, text)))
}

fn expect_object(entry: &Json) -> Result<&Map<String, Json>> {
    entry
        .as_object()
        .ok_or_else(|| OrmletError::Serialization(format!("expected an object, got {}", entry)))
}

/// Parses a stored object column by column. The key the object was stored
/// under fills in the primary column when the object lacks it.
fn read_object(descriptor: &ResourceDescriptor, key: Option<&Value>, object: &Map<String, Json>) -> Result<Properties> {
    let mut properties = Properties::new();
    for column in descriptor.fields() {
        let mut value = match object.get(&column.name) {
            Some(json) => column.column_type.from_json(json)?,
            None => Value::Null,
        };
        if column.primary && value.is_null() {
            if let Some(key) = key {
                value = column.column_type.coerce(key)?;
            }
        }
        properties.insert(column.name.clone(), value);
    }
    Ok(properties)
}

#[async_trait]
impl Driver for HttpDriver {
    fn name(&self) -> &'static str {
        "http"
    }
    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        // the store creates collections on first write, so only the shape is checked
        descriptor.require_numeric_primary().map_err(|e| e.during(Operation::Create))
    }
    async fn save(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Value> {
        self.store(descriptor, properties).await.map_err(|e| e.during(Operation::Save))
    }
    async fn remove(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<()> {
        self.delete(descriptor, properties).await.map_err(|e| e.during(Operation::Remove))
    }
    async fn find(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Properties> {
        self.fetch(descriptor, properties).await.map_err(|e| e.during(Operation::Fetch))
    }
    async fn find_all(&self, descriptor: &ResourceDescriptor, query: &Query) -> Result<Vec<Properties>> {
        self.fetch_all(descriptor, query).await.map_err(|e| e.during(Operation::Fetch))
    }
}
