use crate::errors::{Error, Result};
use crate::fingerprint::DigestAlgorithm;
use crate::model::DeviceEntry;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_DEVICES: &str = "Clamps=http://192.168.178.104/,\
                               Joey=http://192.168.178.105/,\
                               Donbot=http://192.168.178.106/";

/// Settings offered to an operator before a device is configured.
///
/// Built once at startup and handed to the distributor; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub loghost: String,
    pub https_port: u16,
    pub interval_millis: u64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub heater: bool,
    pub manual_mode: bool,
    pub debug: bool,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            loghost: "temperature.example".to_string(),
            https_port: 443,
            interval_millis: 120_000,
            temp_min: 6.0,
            temp_max: 12.0,
            heater: false,
            manual_mode: false,
            debug: false,
        }
    }
}

impl Baseline {
    pub fn validate(&self) -> Result<()> {
        if !(self.temp_min < self.temp_max) {
            return Err(Error::Config(format!(
                "baseline temperature MIN {} must be smaller than MAX {}",
                self.temp_min, self.temp_max
            )));
        }
        if self.interval_millis == 0 {
            return Err(Error::Config("baseline interval must be positive".to_string()));
        }
        Ok(())
    }
}

/// Allow-list of devices configuration may be pushed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: Vec<DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<DeviceEntry>) -> Self {
        Self { devices }
    }

    /// Parses `name=url` pairs separated by commas. URLs are normalized to
    /// end with `/` so that `update` can be appended directly.
    pub fn parse(list: &str) -> Result<Self> {
        let mut devices = Vec::new();

        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("device entry {entry:?} is not name=url")))?;
            let (name, url) = (name.trim(), url.trim());

            if name.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("invalid device entry {entry:?}")));
            }

            let url = if url.ends_with('/') {
                url.to_string()
            } else {
                format!("{url}/")
            };
            devices.push(DeviceEntry {
                name: name.to_string(),
                url,
            });
        }

        if devices.is_empty() {
            return Err(Error::Config("no devices configured".to_string()));
        }

        Ok(Self { devices })
    }

    pub fn entries(&self) -> &[DeviceEntry] {
        &self.devices
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.devices.iter().any(|device| device.url == url)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::parse(DEFAULT_DEVICES).unwrap_or_else(|_| Self::new(Vec::new()))
    }
}

/// Process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http_addr: String,
    pub log_dir: PathBuf,
    pub cert_host: String,
    pub cert_port: u16,
    pub cert_timeout: Duration,
    pub digest: DigestAlgorithm,
    pub baseline: Baseline,
    pub devices: DeviceRegistry,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Baseline::default();

        let digest = match lookup("FINGERPRINT_DIGEST") {
            Some(raw) => raw.parse::<DigestAlgorithm>().map_err(Error::Config)?,
            None => DigestAlgorithm::default(),
        };

        let devices = match lookup("DEVICES") {
            Some(list) => DeviceRegistry::parse(&list)?,
            None => DeviceRegistry::default(),
        };

        let baseline = Baseline {
            loghost: lookup("DEFAULT_LOGHOST").unwrap_or(defaults.loghost),
            https_port: parsed(&lookup, "DEFAULT_HTTPS_PORT", defaults.https_port),
            interval_millis: parsed(&lookup, "DEFAULT_INTERVAL_MS", defaults.interval_millis),
            temp_min: parsed(&lookup, "DEFAULT_TEMP_MIN", defaults.temp_min),
            temp_max: parsed(&lookup, "DEFAULT_TEMP_MAX", defaults.temp_max),
            heater: parsed(&lookup, "DEFAULT_HEATER", defaults.heater),
            manual_mode: parsed(&lookup, "DEFAULT_MANUAL_MODE", defaults.manual_mode),
            debug: parsed(&lookup, "DEFAULT_DEBUG", defaults.debug),
        };
        baseline.validate()?;

        Ok(Self {
            http_addr: lookup("HTTP_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/www/temp")),
            cert_host: lookup("CERT_HOST").unwrap_or_else(|| "localhost".to_string()),
            cert_port: parsed(&lookup, "CERT_PORT", 443),
            cert_timeout: Duration::from_secs(parsed(&lookup, "CERT_TIMEOUT_SECS", 20)),
            digest,
            baseline,
            devices,
        })
    }
}

/// Parses `key`, falling back to `default` when unset or malformed.
fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}
