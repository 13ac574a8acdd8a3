//! Signer certificate metadata for display.
//!
//! Nothing in here establishes trust. The self-signed flag and validity
//! window are surfaced so a caller can warn about them; no chain is built
//! against any root store.

use crate::Result;
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::x509::{X509NameRef, X509Ref};
use std::cmp::Ordering;
use std::fmt;

/// Human-readable facts about the certificate that produced a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    /// Subject distinguished name, e.g. `CN=MCPB Self-Signed Certificate, O=MCPB, C=US`.
    pub subject: String,
    /// Issuer distinguished name, same format as `subject`.
    pub issuer: String,
    /// Subject common name, if present.
    pub common_name: Option<String>,
    /// Serial number in upper-case hex.
    pub serial: String,
    /// Start of the validity window, as printed by OpenSSL.
    pub not_before: String,
    /// End of the validity window, as printed by OpenSSL.
    pub not_after: String,
    /// Whether the current time falls inside the validity window.
    pub currently_valid: bool,
    /// Colon-separated upper-case SHA-256 fingerprint of the DER certificate.
    pub fingerprint_sha256: String,
    /// Issuer equals subject.
    pub self_signed: bool,
}

impl SignerInfo {
    /// Collect metadata from `cert`.
    pub fn from_certificate(cert: &X509Ref) -> Result<Self> {
        let subject = format_name(cert.subject_name());
        let issuer = format_name(cert.issuer_name());
        let self_signed = cert.subject_name().to_der()? == cert.issuer_name().to_der()?;

        let now = Asn1Time::days_from_now(0)?;
        let currently_valid = now.compare(cert.not_before())? != Ordering::Less
            && now.compare(cert.not_after())? != Ordering::Greater;

        let serial = cert.serial_number().to_bn()?.to_hex_str()?.to_string();
        let digest = cert.digest(MessageDigest::sha256())?;

        Ok(Self {
            subject,
            issuer,
            common_name: common_name(cert.subject_name()),
            serial,
            not_before: cert.not_before().to_string(),
            not_after: cert.not_after().to_string(),
            currently_valid,
            fingerprint_sha256: colon_hex(&digest),
            self_signed,
        })
    }
}

impl fmt::Display for SignerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Subject:     {}", self.subject)?;
        writeln!(f, "  Issuer:      {}", self.issuer)?;
        writeln!(f, "  Serial:      {}", self.serial)?;
        writeln!(f, "  Valid from:  {}", self.not_before)?;
        writeln!(f, "  Valid until: {}", self.not_after)?;
        write!(f, "  SHA-256:     {}", self.fingerprint_sha256)
    }
}

/// Render a distinguished name as `SN=value, SN=value`.
pub fn format_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(entry.data().as_slice()).into_owned());
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}
