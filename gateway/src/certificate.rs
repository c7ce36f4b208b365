use crate::errors::{ConfigError, Result};
use crate::metrics::CERT_FETCH_FAILURES_TOTAL;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, error};

/// Something that can present the certificate a device should pin.
pub trait CertificateSource: Send + Sync + 'static {
    fn peer_certificate(
        &self,
    ) -> impl Future<Output = std::result::Result<CertificateDer<'static>, ConfigError>> + Send;
}

/// Captures the certificate served by a TLS endpoint.
///
/// The chain is not verified: the fingerprint is shown to an operator as a
/// suggestion and never used to authenticate anything. Handshake signatures
/// are still checked against the presented certificate.
#[derive(Clone)]
pub struct TlsCertificateSource {
    host: String,
    port: u16,
    timeout: Duration,
    connector: TlsConnector,
}

impl TlsCertificateSource {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(CaptureAnyCertificate { provider }))
            .with_no_client_auth();

        Ok(Self {
            host: host.into(),
            port,
            timeout,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn handshake(&self) -> std::result::Result<CertificateDer<'static>, String> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| format!("connect to {} failed: {}", self.endpoint(), e))?;

        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| format!("invalid server name {:?}: {}", self.host, e))?;

        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| format!("TLS handshake with {} failed: {}", self.endpoint(), e))?;

        let (_, session) = tls.get_ref();
        session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .cloned()
            .ok_or_else(|| format!("{} presented no certificate", self.endpoint()))
    }
}

impl CertificateSource for TlsCertificateSource {
    async fn peer_certificate(
        &self,
    ) -> std::result::Result<CertificateDer<'static>, ConfigError> {
        debug!("Fetching peer certificate from {}", self.endpoint());

        let reason = match tokio::time::timeout(self.timeout, self.handshake()).await {
            Ok(Ok(certificate)) => return Ok(certificate),
            Ok(Err(reason)) => reason,
            Err(_) => format!(
                "no certificate from {} within {:?}",
                self.endpoint(),
                self.timeout
            ),
        };

        CERT_FETCH_FAILURES_TOTAL.inc();
        error!("Certificate fetch failed: {}", reason);
        Err(ConfigError::CertificateUnavailable(reason))
    }
}

#[derive(Debug)]
struct CaptureAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for CaptureAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
