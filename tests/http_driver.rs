use std::sync::Arc;

use ormlet::server::{KeyStore, router};
use ormlet::{
    ClassMetadata, Column, Driver, HttpDriver, Model, OrmletError, Query, Resource, SqliteDriver, Value,
};
use serde_json::json;

struct Note;
impl Model for Note {
    fn declare(class: &mut ClassMetadata) {
        class
            .model_name("note")
            .field("title", Column::text())
            .field("stars", Column::number().default_value(1))
            .field("pinned", Column::boolean())
            .field("body", Column::object());
    }
}

type NoteResource = Resource<Note>;

async fn serve() -> (HttpDriver, Arc<KeyStore>) {
    let store = Arc::new(KeyStore::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = router(Arc::clone(&store));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let driver = HttpDriver::new(&format!("http://{}/", address)).unwrap();
    (driver, store)
}

async fn seed(driver: &dyn Driver) {
    NoteResource::create_with(driver).await.unwrap();
    for (title, stars, pinned) in [("Groceries", 2, false), ("Garden", 5, true), ("Taxes", 1, true)] {
        NoteResource::new()
            .with("title", title)
            .with("stars", stars)
            .with("pinned", pinned)
            .save_with(driver)
            .await
            .unwrap();
    }
}

fn titles(found: &[NoteResource]) -> Vec<String> {
    found.iter().map(|r| r.get("title").unwrap().to_string()).collect()
}

#[tokio::test]
async fn base_url_loses_its_trailing_slash() {
    let (driver, _) = serve().await;
    assert!(!driver.base_url().ends_with('/'));
}

#[tokio::test]
async fn saved_objects_land_under_resource_and_key() {
    let (driver, store) = serve().await;
    NoteResource::create_with(&driver).await.unwrap();
    let key = NoteResource::new().with("id", 7).with("title", "Hello").save_with(&driver).await.unwrap();
    assert_eq!(key, Value::Number(7.0));
    assert_eq!(
        store.get("note", "7"),
        Some(json!({"id": 7, "title": "Hello", "stars": 1, "pinned": false, "body": {}}))
    );
}

#[tokio::test]
async fn generated_keys_are_increasing() {
    let (driver, store) = serve().await;
    let mut keys = Vec::new();
    for _ in 0..5 {
        keys.push(NoteResource::new().with("title", "x").save_with(&driver).await.unwrap());
    }
    assert_eq!(store.len("note"), 5);
    for pair in keys.windows(2) {
        assert!(pair[0].as_f64().unwrap() < pair[1].as_f64().unwrap(), "{:?}", keys);
    }
}

#[tokio::test]
async fn find_reloads_with_native_json_types() {
    let (driver, _) = serve().await;
    let body = json!({"lines": ["milk", "eggs"], "meta": {"shared": true}});
    let note = NoteResource::new().with("title", "List").with("pinned", true).with("body", body.clone());
    let key = note.save_with(&driver).await.unwrap();
    let found = note.clone().with("id", key.clone()).find_with(&driver).await.unwrap();
    assert_eq!(found.get("id"), Some(&key));
    assert_eq!(found.get("title"), Some(&Value::from("List")));
    assert_eq!(found.get("stars"), Some(&Value::Number(1.0)));
    assert_eq!(found.get("pinned"), Some(&Value::Boolean(true)));
    assert_eq!(found.get("body"), Some(&Value::Object(body)));
}

#[tokio::test]
async fn find_without_an_object_is_not_found() {
    let (driver, _) = serve().await;
    let err = NoteResource::new().with("id", 404).find_with(&driver).await.unwrap_err();
    assert!(matches!(err, OrmletError::NotFound { .. }), "{}", err);
}

#[tokio::test]
async fn find_all_filters_in_memory() {
    let (driver, _) = serve().await;
    seed(&driver).await;

    let everything = NoteResource::find_all_with(&driver, &Query::new()).await.unwrap();
    assert_eq!(titles(&everything), ["Groceries", "Garden", "Taxes"]);

    let mut starred = Query::new();
    starred.where_("stars").gte(2).where_("title").is_like("G");
    assert_eq!(titles(&NoteResource::find_all_with(&driver, &starred).await.unwrap()), ["Groceries", "Garden"]);

    let mut lower = Query::new();
    lower.where_("title").is_like("g");
    assert!(NoteResource::find_all_with(&driver, &lower).await.unwrap().is_empty());

    let mut unknown = Query::new();
    unknown.push("stars", "roughly", 3);
    assert_eq!(NoteResource::find_all_with(&driver, &unknown).await.unwrap().len(), 3);
}

#[tokio::test]
async fn find_all_on_an_empty_store_is_empty() {
    let (driver, _) = serve().await;
    assert!(NoteResource::find_all_with(&driver, &Query::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_deletes_and_tolerates_missing_objects() {
    let (driver, store) = serve().await;
    let note = NoteResource::new().with("id", 1).with("title", "Gone soon");
    note.save_with(&driver).await.unwrap();
    note.remove_with(&driver).await.unwrap();
    assert!(store.is_empty("note"));
    note.remove_with(&driver).await.unwrap();
}

#[tokio::test]
async fn unreachable_store_is_a_backend_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    let driver = HttpDriver::new(&format!("http://{}", address)).unwrap();
    let err = NoteResource::new().with("title", "lost").save_with(&driver).await.unwrap_err();
    assert!(matches!(err, OrmletError::Backend { .. }));
    assert!(err.to_string().starts_with("Cannot store item"), "{}", err);
}

#[tokio::test]
async fn both_backends_answer_queries_alike() {
    let (http, _) = serve().await;
    let sqlite = SqliteDriver::open_in_memory().unwrap();
    seed(&http).await;
    seed(&sqlite).await;
    for text in ["stars > 1", "pinned = true and stars < 5", "title like 'a'", "title != 'Taxes'", ""] {
        let query = Query::parse(text).unwrap();
        let from_http = titles(&NoteResource::find_all_with(&http, &query).await.unwrap());
        let from_sqlite = titles(&NoteResource::find_all_with(&sqlite, &query).await.unwrap());
        assert_eq!(from_http, from_sqlite, "{}", text);
    }
}

#[tokio::test]
async fn plain_json_in_object_columns_reloads_on_both_backends() {
    let (http, _) = serve().await;
    let sqlite = SqliteDriver::open_in_memory().unwrap();
    let drivers: [&dyn Driver; 2] = [&http, &sqlite];
    for driver in drivers {
        NoteResource::create_with(driver).await.unwrap();
        for body in [json!(5.5), json!(7), json!("text"), json!(true), json!(null), json!([1, "two"])] {
            let note = NoteResource::new().with("title", "plain").with("body", Value::Object(body.clone()));
            let key = note.save_with(driver).await.unwrap();
            let found = note.with("id", key).find_with(driver).await.unwrap();
            assert_eq!(found.get("body"), Some(&Value::Object(body.clone())), "{} on {}", body, driver.name());
        }
    }
}
