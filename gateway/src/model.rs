use crate::fingerprint::Fingerprint;
use crate::validate::DeviceId;
use serde::{Deserialize, Serialize};

/// Raw telemetry submission as sent by a device.
///
/// Every field is optional so that incomplete submissions reach validation
/// instead of being rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySubmission {
    #[serde(alias = "IP")]
    pub device_id: Option<String>,
    pub uptime: Option<String>,
    pub status: Option<String>,
    pub temperature: Option<String>,
}

impl TelemetrySubmission {
    pub fn new(device_id: &str, uptime: &str, status: &str, temperature: &str) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            uptime: Some(uptime.to_string()),
            status: Some(status.to_string()),
            temperature: Some(temperature.to_string()),
        }
    }
}

/// A validated reading that has not been timestamped yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReading {
    pub device_id: DeviceId,
    pub uptime: String,
    pub status: String,
    pub temperature: String,
}

impl TelemetryReading {
    pub fn observed_at(self, observed_at_millis: i64) -> TelemetryRecord {
        TelemetryRecord {
            device_id: self.device_id,
            uptime: self.uptime,
            status: self.status,
            temperature: self.temperature,
            observed_at_millis,
        }
    }
}

/// One line of a device's telemetry log.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub device_id: DeviceId,
    pub uptime: String,
    pub status: String,
    pub temperature: String,
    pub observed_at_millis: i64,
}

impl TelemetryRecord {
    /// Renders the record as a newline-terminated CSV row:
    /// `uptime,status,temperature,observedAtMillis`.
    pub fn to_csv_line(&self) -> String {
        let observed = self.observed_at_millis.to_string();
        let fields = [
            self.uptime.as_str(),
            self.status.as_str(),
            self.temperature.as_str(),
            observed.as_str(),
        ];

        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            push_csv_field(&mut line, field);
        }
        line.push('\n');
        line
    }
}

fn push_csv_field(line: &mut String, field: &str) {
    let needs_quotes = field
        .chars()
        .any(|c| matches!(c, ',' | '"' | '\n' | '\r' | '\t' | ' '));

    if !needs_quotes {
        line.push_str(field);
        return;
    }

    line.push('"');
    for c in field.chars() {
        if c == '"' {
            line.push('"');
        }
        line.push(c);
    }
    line.push('"');
}

/// Raw configuration request, keyed by the names used on the wire.
///
/// The aliases accept the parameter names older settings forms send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    #[serde(alias = "URL")]
    pub hostname_selector: Option<String>,
    #[serde(alias = "SHA1")]
    pub cert_fingerprint: Option<String>,
    pub loghost: Option<String>,
    pub https_port: Option<String>,
    #[serde(alias = "interval")]
    pub interval_millis: Option<String>,
    #[serde(alias = "temp_min")]
    pub temp_min: Option<String>,
    #[serde(alias = "temp_max")]
    pub temp_max: Option<String>,
    pub heater: Option<String>,
    #[serde(alias = "manual")]
    pub manual_mode: Option<String>,
    pub debug: Option<String>,
}

impl ConfigRequest {
    /// Names of the required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required = [
            ("hostnameSelector", &self.hostname_selector),
            ("certFingerprint", &self.cert_fingerprint),
            ("loghost", &self.loghost),
            ("httpsPort", &self.https_port),
            ("intervalMillis", &self.interval_millis),
            ("tempMin", &self.temp_min),
            ("tempMax", &self.temp_max),
        ];

        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Operating configuration proposed for a single device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub hostname_selector: String,
    pub cert_fingerprint: Fingerprint,
    pub loghost: String,
    pub https_port: u16,
    pub interval_millis: u64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub heater: bool,
    pub manual_mode: bool,
    pub debug: bool,
}

/// Query parameters carried by a [`Directive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveParams {
    pub cert_fingerprint: String,
    pub loghost: String,
    pub https_port: u16,
    pub interval_millis: u64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub heater: bool,
    pub manual_mode: bool,
    pub debug: bool,
}

impl From<&DeviceConfig> for DirectiveParams {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            cert_fingerprint: config.cert_fingerprint.to_string(),
            loghost: config.loghost.clone(),
            https_port: config.https_port,
            interval_millis: config.interval_millis,
            temp_min: config.temp_min,
            temp_max: config.temp_max,
            heater: config.heater,
            manual_mode: config.manual_mode,
            debug: config.debug,
        }
    }
}

/// Redirect target instructing a device to apply a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    target: String,
}

impl Directive {
    pub(crate) fn new(target: String) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The url-encoded parameter list after the `?`.
    pub fn query(&self) -> &str {
        self.target
            .split_once('?')
            .map_or("", |(_, query)| query)
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.target)
    }
}

/// A device an operator may push configuration to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub name: String,
    pub url: String,
}

/// Baseline settings offered to an operator before any proposal is made.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultConfig {
    pub devices: Vec<DeviceEntry>,
    pub cert_fingerprint: Fingerprint,
    pub loghost: String,
    pub https_port: u16,
    pub interval_millis: u64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub heater: bool,
    pub manual_mode: bool,
    pub debug: bool,
}
