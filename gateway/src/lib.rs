//! Telemetry gateway for field thermostats.
//!
//! Devices append readings to per-device CSV logs through [`TelemetryLog`];
//! operators push validated settings to devices through
//! [`ConfigDistributor`], which redirects them to the device's own `update`
//! endpoint.

pub mod certificate;
pub mod config;
pub mod distributor;
pub mod errors;
pub mod fingerprint;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod telemetry_log;
pub mod validate;

pub use certificate::{CertificateSource, TlsCertificateSource};
pub use config::{Baseline, DeviceRegistry, Settings};
pub use distributor::ConfigDistributor;
pub use errors::{ConfigError, Error, IngestError, Result};
pub use fingerprint::{DigestAlgorithm, Fingerprint};
pub use telemetry_log::{Clock, TelemetryLog, WallClock};
