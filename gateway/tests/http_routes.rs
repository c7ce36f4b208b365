use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use gateway::model::DirectiveParams;
use gateway::{
    rest, Baseline, CertificateSource, ConfigDistributor, ConfigError, DeviceRegistry,
    DigestAlgorithm, TelemetryLog,
};
use http_body_util::BodyExt;
use rand::Rng;
use rustls::pki_types::CertificateDer;
use std::fs;
use std::path::Path;
use tower::ServiceExt;

const CERT_PEM: &str = include_str!("fixtures/localhost.crt.pem");
const CERT_SHA1: &str = "42:69:3F:BE:AF:EB:00:72:D4:AF:07:6F:0E:6D:15:20:53:E1:EF:94";

struct FixtureSource;

impl CertificateSource for FixtureSource {
    async fn peer_certificate(&self) -> Result<CertificateDer<'static>, ConfigError> {
        rustls_pemfile::certs(&mut CERT_PEM.as_bytes())
            .next()
            .and_then(|cert| cert.ok())
            .ok_or_else(|| ConfigError::CertificateUnavailable("bad fixture".to_string()))
    }
}

struct OfflineSource;

impl CertificateSource for OfflineSource {
    async fn peer_certificate(&self) -> Result<CertificateDer<'static>, ConfigError> {
        Err(ConfigError::CertificateUnavailable("timed out".to_string()))
    }
}

fn app<S: CertificateSource>(dir: &Path, source: S) -> Router {
    let log = TelemetryLog::open(dir).unwrap();
    let distributor = ConfigDistributor::new(
        Baseline::default(),
        DeviceRegistry::default(),
        DigestAlgorithm::Sha1,
        source,
    );
    rest::create_router(log, distributor)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_logtemp_appends_record() {
    let dir = tempfile::tempdir().unwrap();
    let temperature = rand::thread_rng().gen_range(15.0..35.0_f64);
    let uri = format!("/logtemp?deviceId=192.168.178.104&uptime=3600&status=OK&temperature={temperature:.2}");

    let (status, _, body) = get(app(dir.path(), OfflineSource), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    let contents = fs::read_to_string(dir.path().join("temp-log-192.168.178.104.csv")).unwrap();
    let fields: Vec<&str> = contents.trim_end().split(',').collect();
    assert_eq!(fields[..3], ["3600", "OK", format!("{temperature:.2}").as_str()]);
    assert!(fields[3].parse::<i64>().unwrap() > 0);
}

#[tokio::test]
async fn test_logtemp_accepts_ip_parameter() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, _) = get(
        app(dir.path(), OfflineSource),
        "/logtemp?IP=10.0.0.7&uptime=1&status=OK&temperature=20",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(dir.path().join("temp-log-10.0.0.7.csv").exists());
}

#[tokio::test]
async fn test_logtemp_incomplete_is_silently_skipped() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, body) = get(
        app(dir.path(), OfflineSource),
        "/logtemp?deviceId=dev1&uptime=&status=&temperature=",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_logtemp_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, _) = get(
        app(dir.path(), OfflineSource),
        "/logtemp?deviceId=..%2F..%2Fetc%2Fpasswd&uptime=1&status=OK&temperature=20",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_logtemp_rejects_line_break_in_status() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, _) = get(
        app(dir.path(), OfflineSource),
        "/logtemp?deviceId=dev1&uptime=1&status=OK%0A9%2C9%2C9%2C9&temperature=20",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_settings_redirects_valid_proposal() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!(
        "/settings?URL=http%3A%2F%2F192.168.178.104%2F&SHA1={}&loghost=temperature.example\
         &httpsPort=443&interval=120000&temp_min=6&temp_max=12&heater=true&manual=false&debug=true",
        CERT_SHA1.replace(':', "%3A")
    );

    let (status, location, _) = get(app(dir.path(), OfflineSource), &uri).await;

    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    let (base, query) = location.split_once('?').unwrap();
    assert_eq!(base, "http://192.168.178.104/update");

    let params: DirectiveParams = serde_urlencoded::from_str(query).unwrap();
    assert_eq!(params.cert_fingerprint, CERT_SHA1);
    assert_eq!(params.loghost, "temperature.example");
    assert_eq!(params.https_port, 443);
    assert_eq!(params.interval_millis, 120_000);
    assert_eq!(params.temp_min, 6.0);
    assert_eq!(params.temp_max, 12.0);
    assert!(params.heater);
    assert!(!params.manual_mode);
    assert!(params.debug);
}

#[tokio::test]
async fn test_settings_rejects_inverted_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!(
        "/settings?hostnameSelector=http%3A%2F%2F192.168.178.104%2F&certFingerprint={CERT_SHA1}\
         &loghost=temperature.example&httpsPort=443&intervalMillis=120000&tempMin=12&tempMax=6"
    );

    let (status, location, body) = get(app(dir.path(), OfflineSource), &uri).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(location.is_none());
    assert!(body.contains("must be smaller"), "unexpected body: {body}");
}

#[tokio::test]
async fn test_settings_rejects_unlisted_device() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!(
        "/settings?hostnameSelector=http%3A%2F%2Fattacker.example%2F&certFingerprint={CERT_SHA1}\
         &loghost=temperature.example&httpsPort=443&intervalMillis=120000&tempMin=6&tempMax=12"
    );

    let (status, location, _) = get(app(dir.path(), OfflineSource), &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(location.is_none());
}

#[tokio::test]
async fn test_settings_serves_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, body) = get(app(dir.path(), FixtureSource), "/settings").await;

    assert_eq!(status, StatusCode::OK);
    let defaults: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(defaults["certFingerprint"], CERT_SHA1);
    assert_eq!(defaults["loghost"], "temperature.example");
    assert_eq!(defaults["intervalMillis"], 120_000);
    assert_eq!(defaults["tempMin"], 6.0);
    assert_eq!(defaults["tempMax"], 12.0);
    assert_eq!(defaults["devices"][2]["name"], "Donbot");
}

#[tokio::test]
async fn test_settings_defaults_fail_closed() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, body) = get(app(dir.path(), OfflineSource), "/settings").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.contains(CERT_SHA1));
}

#[tokio::test]
async fn test_healthz() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(dir.path(), OfflineSource), "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}
