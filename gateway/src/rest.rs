use crate::certificate::CertificateSource;
use crate::distributor::ConfigDistributor;
use crate::errors::{ConfigError, IngestError};
use crate::model::{ConfigRequest, TelemetrySubmission};
use crate::telemetry_log::TelemetryLog;
use crate::validate::parse_config;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, error};

struct AppState<S> {
    log: TelemetryLog,
    distributor: Arc<ConfigDistributor<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            distributor: self.distributor.clone(),
        }
    }
}

pub fn create_router<S: CertificateSource>(
    log: TelemetryLog,
    distributor: ConfigDistributor<S>,
) -> Router {
    let state = AppState {
        log,
        distributor: Arc::new(distributor),
    };

    Router::new()
        .route("/logtemp", get(log_temperature::<S>))
        .route("/settings", get(settings::<S>))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Appends one reading. Incomplete submissions are acknowledged with an
/// empty body and not stored.
async fn log_temperature<S: CertificateSource>(
    State(state): State<AppState<S>>,
    Query(submission): Query<TelemetrySubmission>,
) -> Result<&'static str, AppError> {
    match state.log.submit(&submission).await {
        Ok(_) => Ok("ok"),
        Err(IngestError::MissingFields(_)) => Ok(""),
        Err(e) => Err(e.into()),
    }
}

/// Redirects a complete proposal to the device, otherwise returns the
/// defaults for the settings form.
async fn settings<S: CertificateSource>(
    State(state): State<AppState<S>>,
    Query(request): Query<ConfigRequest>,
) -> Result<Response, AppError> {
    if !request.is_complete() {
        debug!(
            "Settings request missing {:?}, serving defaults",
            request.missing_fields()
        );
        let defaults = state.distributor.default_config().await?;
        return Ok(Json(defaults).into_response());
    }

    let candidate = parse_config(&request)?;
    let directive = state
        .distributor
        .propose(&candidate, &candidate.hostname_selector)?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, directive.target().to_string())],
    )
        .into_response())
}

struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("API error: {}", self.error);
        } else {
            debug!("Request rejected: {}", self.error);
        }
        (self.status, self.error.to_string()).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let status = match &err {
            IngestError::InvalidIdentity(_)
            | IngestError::MissingFields(_)
            | IngestError::MalformedField(_) => StatusCode::BAD_REQUEST,
            IngestError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            error: err.into(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        let status = match &err {
            ConfigError::ThresholdInverted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ConfigError::InvalidField { .. } | ConfigError::UnknownDevice(_) => {
                StatusCode::BAD_REQUEST
            }
            ConfigError::CertificateUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            error: err.into(),
        }
    }
}
