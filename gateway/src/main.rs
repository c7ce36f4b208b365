use axum::{routing::get, Router};
use gateway::{metrics, rest, ConfigDistributor, Settings, TelemetryLog, TlsCertificateSource};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting telemetry gateway");
    info!("HTTP server: {}", settings.http_addr);
    info!(
        "Certificate source: {}:{} ({:?}, timeout {:?})",
        settings.cert_host, settings.cert_port, settings.digest, settings.cert_timeout
    );
    info!("Devices: {}", settings.devices.entries().len());

    // Initialize metrics
    metrics::init_metrics();

    let log = match TelemetryLog::open(&settings.log_dir) {
        Ok(log) => log,
        Err(e) => {
            error!(
                "Failed to open log directory {}: {}",
                settings.log_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let source = match TlsCertificateSource::new(
        settings.cert_host.clone(),
        settings.cert_port,
        settings.cert_timeout,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build TLS client: {}", e);
            std::process::exit(1);
        }
    };

    let distributor = ConfigDistributor::new(
        settings.baseline.clone(),
        settings.devices.clone(),
        settings.digest,
        source,
    );

    // Build HTTP app with device endpoints and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(log, distributor));

    let listener = tokio::net::TcpListener::bind(&settings.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", settings.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", settings.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
