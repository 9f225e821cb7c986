//! Tests for loading settings and secrets from disk.

use std::fs;
use std::io::Write;

use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geofacade::config::Secrets;
use geofacade::{GeocodingError, GeocodingOptions, GeocodingService, GeocodingSettings, ProviderKind};

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[cfg(unix)]
fn set_mode(file: &NamedTempFile, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(file.path(), fs::Permissions::from_mode(mode)).unwrap();
}

#[test]
fn load_reads_explicit_path() {
    let file = write_temp(
        r#"
        [search]
        auto_fallback = false

        [[providers]]
        name = "mapbox"
        kind = "mapbox"
        "#,
    );

    let settings = GeocodingSettings::load(Some(file.path())).unwrap();
    assert!(!settings.search.auto_fallback);
    assert_eq!(settings.providers.len(), 1);
    assert_eq!(settings.providers[0].kind, ProviderKind::Mapbox);
}

#[test]
fn missing_explicit_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = GeocodingSettings::load_or_default(Some(&missing)).unwrap_err();
    assert!(matches!(err, GeocodingError::Configuration(_)));
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let file = write_temp("[search\nauto_fallback = ");
    let err = GeocodingSettings::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, GeocodingError::Configuration(_)));
}

#[cfg(unix)]
#[test]
fn secrets_are_read_from_private_file() {
    let file = write_temp(
        r#"
        [google]
        api_key = "AIza-test"
        "#,
    );
    set_mode(&file, 0o600);

    let secrets = Secrets::load_from(file.path()).unwrap();
    assert_eq!(secrets.api_key("google").as_deref(), Some("AIza-test"));
    assert_eq!(secrets.api_key("geofacade-test-unset-provider"), None);
}

#[cfg(unix)]
#[test]
fn world_readable_secrets_are_rejected() {
    let file = write_temp("[google]\napi_key = \"AIza-test\"\n");
    set_mode(&file, 0o644);

    let err = Secrets::load_from(file.path()).unwrap_err();
    match err {
        GeocodingError::Configuration(msg) => assert!(msg.contains("insecure permissions")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn loaded_settings_drive_real_clients() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Greenwich"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lat": "51.4826",
            "lon": "-0.0077",
            "display_name": "Greenwich, London, United Kingdom"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_temp(&format!(
        r#"
        [[providers]]
        name = "osm"
        kind = "osm"
        base_url = "{}"
        user_agent = "geofacade-tests"
        "#,
        server.uri()
    ));
    let settings = GeocodingSettings::load(Some(file.path())).unwrap();
    let service = GeocodingService::builder().settings(settings).build().unwrap();

    let first = service
        .geocode("Greenwich", &GeocodingOptions::default())
        .await
        .unwrap();
    let second = service
        .geocode("greenwich", &GeocodingOptions::default())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].provider, "osm");
}

#[test]
fn keyed_provider_without_key_is_inactive() {
    let settings = GeocodingSettings::from_toml(
        r#"
        [[providers]]
        name = "google"
        kind = "google"
        "#,
    )
    .unwrap();
    let service = GeocodingService::builder().settings(settings).build().unwrap();

    let status = service.provider_status();
    assert!(!status[0].active);
    assert!(!status[0].has_api_key);
    assert!(!service.is_available());
}
