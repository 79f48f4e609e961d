use std::io::Write;

use ormlet::settings::{DriverKind, Settings};

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.driver, DriverKind::Sqlite);
    assert_eq!(settings.sqlite.path, None);
    assert_eq!(settings.http.base_url, "http://127.0.0.1:7878");
    assert_eq!(settings.http.timeout_ms, 30_000);
    assert_eq!(settings.store.bind, "127.0.0.1:7878");
}

#[test]
fn file_sections_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
driver = "http"

[http]
base_url = "http://store.local:9000"

[store]
bind = "0.0.0.0:9000"
"#
    )
    .unwrap();
    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.driver, DriverKind::Http);
    assert_eq!(settings.http.base_url, "http://store.local:9000");
    assert_eq!(settings.http.timeout_ms, 30_000);
    assert_eq!(settings.store.bind, "0.0.0.0:9000");
}

#[test]
fn unknown_driver_is_a_config_error() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, r#"driver = "postgres""#).unwrap();
    assert!(matches!(Settings::load(file.path()), Err(ormlet::OrmletError::Config(_))));
}

#[tokio::test]
async fn connect_builds_the_configured_driver() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.sqlite.path = Some(dir.path().join("app.db").to_string_lossy().into_owned());
    assert_eq!(settings.connect().unwrap().name(), "sqlite");

    settings.sqlite.path = Some(String::new());
    assert!(settings.connect().is_err());

    settings.driver = DriverKind::Http;
    assert_eq!(settings.connect().unwrap().name(), "http");
}
