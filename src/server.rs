use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value as JsonValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

/// In-memory key-JSON store: per resource, a map from key to stored object.
/// It is what the HTTP driver talks to, and what its tests run against.
#[derive(Debug, Default)]
pub struct KeyStore {
    collections: RwLock<HashMap<String, BTreeMap<String, JsonValue>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, resource: &str, key: &str) -> Option<JsonValue> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections.get(resource).and_then(|c| c.get(key)).cloned()
    }
    /// Stores the object, returning true when it replaced an existing one.
    pub fn put(&self, resource: &str, key: &str, object: JsonValue) -> bool {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(resource.to_string())
            .or_default()
            .insert(key.to_string(), object)
            .is_some()
    }
    pub fn remove(&self, resource: &str, key: &str) -> Option<JsonValue> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.get_mut(resource).and_then(|c| c.remove(key))
    }
    pub fn list(&self, resource: &str) -> Option<BTreeMap<String, JsonValue>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections.get(resource).cloned()
    }
    /// Number of objects stored for a resource.
    pub fn len(&self, resource: &str) -> usize {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections.get(resource).map(|c| c.len()).unwrap_or(0)
    }
    pub fn is_empty(&self, resource: &str) -> bool {
        self.len(resource) == 0
    }
}

async fn list(State(store): State<Arc<KeyStore>>, Path(resource): Path<String>) -> Response {
    match store.list(&resource) {
        Some(objects) => {
            debug!(%resource, count = objects.len(), "listing");
            Json(objects).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such resource").into_response(),
    }
}

async fn fetch(State(store): State<Arc<KeyStore>>, Path((resource, key)): Path<(String, String)>) -> Response {
    match store.get(&resource, &key) {
        Some(object) => Json(object).into_response(),
        None => (StatusCode::NOT_FOUND, "no such key").into_response(),
    }
}

async fn store_object(
    State(store): State<Arc<KeyStore>>,
    Path((resource, key)): Path<(String, String)>,
    Json(object): Json<JsonValue>,
) -> Response {
    if !object.is_object() {
        return (StatusCode::BAD_REQUEST, "expected a JSON object").into_response();
    }
    let replaced = store.put(&resource, &key, object);
    debug!(%resource, %key, replaced, "stored");
    let status = if replaced { StatusCode::OK } else { StatusCode::CREATED };
    status.into_response()
}

async fn delete(State(store): State<Arc<KeyStore>>, Path((resource, key)): Path<(String, String)>) -> Response {
    match store.remove(&resource, &key) {
        Some(_) => {
            debug!(%resource, %key, "removed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such key").into_response(),
    }
}

pub fn router(store: Arc<KeyStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    info!("key store routes ready");
    Router::new()
        .route("/:resource", get(list))
        .route("/:resource/:key", get(fetch).put(store_object).delete(delete))
        .layer(cors)
        .with_state(store)
}
