use crate::errors::{ConfigError, IngestError};
use crate::fingerprint::Fingerprint;
use crate::model::{ConfigRequest, DeviceConfig, TelemetryReading, TelemetrySubmission};
use std::fmt;
use std::str::FromStr;

/// File name a device's log is stored under is `<prefix><id><suffix>`.
pub const LOG_FILE_PREFIX: &str = "temp-log-";
pub const LOG_FILE_SUFFIX: &str = ".csv";

/// Longest identity whose log file name still fits in 255 bytes.
pub const MAX_DEVICE_ID_LEN: usize = 255 - LOG_FILE_PREFIX.len() - LOG_FILE_SUFFIX.len();

/// Device identity that is safe to embed in a file name.
///
/// Only ASCII alphanumerics, `.` and `-` are accepted, which covers IPv4
/// addresses and hostnames but rules out path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_DEVICE_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-');

        if !valid {
            return Err(IngestError::InvalidIdentity(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a telemetry submission
///
/// Missing fields are reported before the identity is looked at, so an
/// incomplete submission with a bad `deviceId` is `MissingFields`. Control
/// characters are refused so that every record stays on one line.
pub fn validate(submission: &TelemetrySubmission) -> Result<TelemetryReading, IngestError> {
    let fields = [
        ("deviceId", &submission.device_id),
        ("uptime", &submission.uptime),
        ("status", &submission.status),
        ("temperature", &submission.temperature),
    ];

    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(IngestError::MissingFields(missing));
    }

    let device_id = DeviceId::parse(submission.device_id.as_deref().unwrap_or_default())?;

    for (name, value) in &fields[1..] {
        if value.as_deref().is_some_and(|v| v.chars().any(char::is_control)) {
            return Err(IngestError::MalformedField(*name));
        }
    }

    let present = |value: &Option<String>| value.clone().unwrap_or_default();

    Ok(TelemetryReading {
        device_id,
        uptime: present(&submission.uptime),
        status: present(&submission.status),
        temperature: present(&submission.temperature),
    })
}

/// Parses a complete configuration request into a typed [`DeviceConfig`].
///
/// The temperature thresholds are only checked for being finite numbers
/// here; their ordering is a distribution rule.
pub fn parse_config(request: &ConfigRequest) -> Result<DeviceConfig, ConfigError> {
    let https_port: u16 = parse_field("httpsPort", &request.https_port)?;
    if https_port == 0 {
        return Err(invalid("httpsPort", "port must be non-zero"));
    }

    let interval_millis: u64 = parse_field("intervalMillis", &request.interval_millis)?;
    if interval_millis == 0 {
        return Err(invalid("intervalMillis", "interval must be positive"));
    }

    let temp_min: f64 = parse_field("tempMin", &request.temp_min)?;
    let temp_max: f64 = parse_field("tempMax", &request.temp_max)?;
    for (field, value) in [("tempMin", temp_min), ("tempMax", temp_max)] {
        if !value.is_finite() {
            return Err(invalid(field, "not a finite number"));
        }
    }

    Ok(DeviceConfig {
        hostname_selector: required("hostnameSelector", &request.hostname_selector)?.to_string(),
        cert_fingerprint: Fingerprint::parse(required(
            "certFingerprint",
            &request.cert_fingerprint,
        )?)?,
        loghost: required("loghost", &request.loghost)?.to_string(),
        https_port,
        interval_millis,
        temp_min,
        temp_max,
        heater: flag(&request.heater),
        manual_mode: flag(&request.manual_mode),
        debug: flag(&request.debug),
    })
}

/// Only the literal `"true"` switches a flag on.
fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(invalid(field, "missing")),
    }
}

fn parse_field<T>(field: &'static str, value: &Option<String>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    required(field, value)?
        .parse()
        .map_err(|e: T::Err| invalid(field, &e.to_string()))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_request() -> ConfigRequest {
        ConfigRequest {
            hostname_selector: Some("http://192.168.178.104/".to_string()),
            cert_fingerprint: Some(
                "42:69:3f:be:af:eb:00:72:d4:af:07:6f:0e:6d:15:20:53:e1:ef:94".to_string(),
            ),
            loghost: Some("temperature.example".to_string()),
            https_port: Some("443".to_string()),
            interval_millis: Some("120000".to_string()),
            temp_min: Some("6".to_string()),
            temp_max: Some("12".to_string()),
            heater: Some("true".to_string()),
            manual_mode: None,
            debug: Some("TRUE".to_string()),
        }
    }

    #[test]
    fn test_device_id_accepts_addresses_and_hostnames() {
        for id in ["192.168.178.104", "dev-1", "clamps.local", "A1"] {
            assert_eq!(DeviceId::parse(id).unwrap().as_str(), id);
        }
    }

    #[test]
    fn test_device_id_rejects_unsafe_values() {
        let too_long = "a".repeat(MAX_DEVICE_ID_LEN + 1);
        for id in [
            "",
            "../etc/passwd",
            "dev/1",
            "dev\\1",
            "dev 1",
            "dev_1",
            "dev\0",
            "dév",
            too_long.as_str(),
        ] {
            assert!(
                matches!(DeviceId::parse(id), Err(IngestError::InvalidIdentity(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_device_id_length_fits_file_name() {
        assert_eq!(MAX_DEVICE_ID_LEN, 242);
        assert!(DeviceId::parse(&"a".repeat(242)).is_ok());
        assert!(matches!(
            DeviceId::parse(&"a".repeat(243)),
            Err(IngestError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_control_characters_rejected() {
        for (status, temperature) in [("OK\n1,2,3,4", "20"), ("OK", "20\r"), ("O\tK", "20")] {
            let result = validate(&TelemetrySubmission::new("dev-1", "1", status, temperature));
            assert!(
                matches!(result, Err(IngestError::MalformedField(_))),
                "{status:?}/{temperature:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_fields_win_over_bad_identity() {
        let result = validate(&TelemetrySubmission::new("../dev", "", "OK", "20"));
        assert!(matches!(result, Err(IngestError::MissingFields(_))));
    }

    #[test]
    fn test_valid_submission() {
        let reading = validate(&TelemetrySubmission::new("dev-1", "3600", "OK", "21.5")).unwrap();

        assert_eq!(reading.device_id.as_str(), "dev-1");
        assert_eq!(reading.uptime, "3600");
        assert_eq!(reading.status, "OK");
        assert_eq!(reading.temperature, "21.5");
    }

    #[test]
    fn test_missing_fields_listed() {
        let result = validate(&TelemetrySubmission::new("dev1", "", "", ""));

        match result {
            Err(IngestError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["uptime", "status", "temperature"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_device_id_is_missing_not_invalid() {
        let submission = TelemetrySubmission {
            device_id: None,
            ..TelemetrySubmission::new("x", "1", "OK", "20")
        };

        assert!(matches!(
            validate(&submission),
            Err(IngestError::MissingFields(fields)) if fields == vec!["deviceId"]
        ));
    }

    #[test]
    fn test_invalid_identity_with_complete_fields() {
        let result = validate(&TelemetrySubmission::new("../dev", "1", "OK", "20"));
        assert!(matches!(result, Err(IngestError::InvalidIdentity(_))));
    }

    #[test]
    fn test_parse_complete_config() {
        let config = parse_config(&complete_request()).unwrap();

        assert_eq!(config.hostname_selector, "http://192.168.178.104/");
        assert_eq!(
            config.cert_fingerprint.as_str(),
            "42:69:3F:BE:AF:EB:00:72:D4:AF:07:6F:0E:6D:15:20:53:E1:EF:94"
        );
        assert_eq!(config.https_port, 443);
        assert_eq!(config.interval_millis, 120_000);
        assert_eq!(config.temp_min, 6.0);
        assert_eq!(config.temp_max, 12.0);
        assert!(config.heater);
        assert!(!config.manual_mode);
        // Only the exact lowercase literal counts
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_config_rejects_bad_numbers() {
        let mut request = complete_request();
        request.https_port = Some("https".to_string());
        assert!(matches!(
            parse_config(&request),
            Err(ConfigError::InvalidField { field: "httpsPort", .. })
        ));

        let mut request = complete_request();
        request.https_port = Some("0".to_string());
        assert!(parse_config(&request).is_err());

        let mut request = complete_request();
        request.temp_min = Some("NaN".to_string());
        assert!(matches!(
            parse_config(&request),
            Err(ConfigError::InvalidField { field: "tempMin", .. })
        ));

        let mut request = complete_request();
        request.interval_millis = Some("-5".to_string());
        assert!(matches!(
            parse_config(&request),
            Err(ConfigError::InvalidField { field: "intervalMillis", .. })
        ));
    }

    #[test]
    fn test_parse_config_rejects_missing_loghost() {
        let mut request = complete_request();
        request.loghost = Some("   ".to_string());
        assert!(matches!(
            parse_config(&request),
            Err(ConfigError::InvalidField { field: "loghost", .. })
        ));
    }
}
