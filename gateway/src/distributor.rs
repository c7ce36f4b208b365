use crate::certificate::CertificateSource;
use crate::config::{Baseline, DeviceRegistry};
use crate::errors::ConfigError;
use crate::fingerprint::{DigestAlgorithm, Fingerprint};
use crate::metrics::{PROPOSALS_REJECTED_TOTAL, PROPOSALS_TOTAL};
use crate::model::{DefaultConfig, DeviceConfig, Directive, DirectiveParams};
use tracing::{debug, info, warn};

/// Validates device configuration and turns it into redirect directives.
pub struct ConfigDistributor<S> {
    baseline: Baseline,
    devices: DeviceRegistry,
    digest: DigestAlgorithm,
    source: S,
}

impl<S: CertificateSource> ConfigDistributor<S> {
    pub fn new(
        baseline: Baseline,
        devices: DeviceRegistry,
        digest: DigestAlgorithm,
        source: S,
    ) -> Self {
        Self {
            baseline,
            devices,
            digest,
            source,
        }
    }

    /// Checks `candidate` and builds the directive sending it to
    /// `<redirect_base>update`.
    ///
    /// The threshold ordering is checked first; nothing else is looked at
    /// for an inverted pair.
    pub fn propose(
        &self,
        candidate: &DeviceConfig,
        redirect_base: &str,
    ) -> Result<Directive, ConfigError> {
        PROPOSALS_TOTAL.inc();

        let result = self.build_directive(candidate, redirect_base);
        match &result {
            Ok(directive) => info!(
                "Directing {} to {}",
                candidate.hostname_selector,
                directive.target()
            ),
            Err(e) => {
                PROPOSALS_REJECTED_TOTAL.inc();
                warn!("Rejected proposal for {}: {}", candidate.hostname_selector, e);
            }
        }
        result
    }

    fn build_directive(
        &self,
        candidate: &DeviceConfig,
        redirect_base: &str,
    ) -> Result<Directive, ConfigError> {
        // Also catches NaN, which compares false both ways
        if !(candidate.temp_min < candidate.temp_max) {
            return Err(ConfigError::ThresholdInverted {
                min: candidate.temp_min,
                max: candidate.temp_max,
            });
        }

        if !self.devices.contains_url(&candidate.hostname_selector) {
            return Err(ConfigError::UnknownDevice(
                candidate.hostname_selector.clone(),
            ));
        }

        let query = serde_urlencoded::to_string(DirectiveParams::from(candidate)).map_err(|e| {
            ConfigError::InvalidField {
                field: "directive",
                reason: e.to_string(),
            }
        })?;

        Ok(Directive::new(format!("{redirect_base}update?{query}")))
    }

    /// Baseline settings plus the fingerprint currently served by the
    /// certificate source. Fails rather than offering a made-up fingerprint.
    pub async fn default_config(&self) -> Result<DefaultConfig, ConfigError> {
        let certificate = self.source.peer_certificate().await?;
        let cert_fingerprint = Fingerprint::of_der(certificate.as_ref(), self.digest);
        debug!("Resolved certificate fingerprint {}", cert_fingerprint);

        let baseline = &self.baseline;
        Ok(DefaultConfig {
            devices: self.devices.entries().to_vec(),
            cert_fingerprint,
            loghost: baseline.loghost.clone(),
            https_port: baseline.https_port,
            interval_millis: baseline.interval_millis,
            temp_min: baseline.temp_min,
            temp_max: baseline.temp_max,
            heater: baseline.heater,
            manual_mode: baseline.manual_mode,
            debug: baseline.debug,
        })
    }
}
