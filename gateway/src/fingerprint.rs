//! Certificate fingerprints in the `AB:CD:...` notation devices are
//! configured with.

use crate::errors::ConfigError;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest a fingerprint is computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// 160-bit digest, what the devices pin against.
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => Sha1::digest(bytes).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        }
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(DigestAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(format!("unsupported digest algorithm: {other}")),
        }
    }
}

/// Uppercase hex digest, byte pairs separated by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints DER-encoded certificate bytes.
    pub fn of_der(der: &[u8], algorithm: DigestAlgorithm) -> Self {
        Self::from_digest(&algorithm.digest(der))
    }

    /// Fingerprints the first certificate of a PEM document.
    ///
    /// The armor lines and any line breaks (`\n` or `\r\n`) are stripped
    /// before the base64 body is decoded, so the digest covers exactly the
    /// DER bytes.
    pub fn of_pem(pem: &str, algorithm: DigestAlgorithm) -> Result<Self, ConfigError> {
        let mut reader = pem.as_bytes();
        let der = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| {
                ConfigError::CertificateUnavailable("no certificate in PEM input".to_string())
            })?
            .map_err(|e| ConfigError::CertificateUnavailable(format!("malformed PEM: {e}")))?;

        Ok(Self::of_der(der.as_ref(), algorithm))
    }

    /// Normalizes operator input into canonical form.
    ///
    /// Case, colons and whitespace are ignored; the remaining digits must
    /// describe a SHA-1 or SHA-256 digest.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let digits: String = raw
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();

        let bytes = hex::decode(&digits).map_err(|e| ConfigError::InvalidField {
            field: "certFingerprint",
            reason: e.to_string(),
        })?;

        let known = [DigestAlgorithm::Sha1, DigestAlgorithm::Sha256]
            .iter()
            .any(|algorithm| algorithm.output_len() == bytes.len());
        if !known {
            return Err(ConfigError::InvalidField {
                field: "certFingerprint",
                reason: format!("{} bytes is not a SHA-1 or SHA-256 digest", bytes.len()),
            });
        }

        Ok(Self::from_digest(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_digest(digest: &[u8]) -> Self {
        let hex = hex::encode_upper(digest);
        let mut grouped = String::with_capacity(hex.len() + hex.len() / 2);
        for (i, c) in hex.chars().enumerate() {
            if i > 0 && i % 2 == 0 {
                grouped.push(':');
            }
            grouped.push(c);
        }
        Self(grouped)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
