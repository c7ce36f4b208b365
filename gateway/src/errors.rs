use std::path::PathBuf;
use thiserror::Error;

/// Startup and wiring errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single telemetry submission.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid device identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Missing telemetry fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Malformed telemetry field: {0}")]
    MalformedField(&'static str),

    #[error("Telemetry store {} unavailable: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of a configuration proposal or of resolving the defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Temperature MIN ({min}) must be smaller than temperature MAX ({max})")]
    ThresholdInverted { min: f64, max: f64 },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Certificate unavailable: {0}")]
    CertificateUnavailable(String),
}
