//! Certificate and private key loading

use super::cert::format_name;
use super::pem::{self, PemBlock};
use crate::{Error, Result};
use openssl::ec::EcKey;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::X509;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Signing certificate, matching private key, and optional intermediates.
///
/// The private key is only ever used to produce signatures; it is never
/// written into a signature payload. The `Debug` output omits it.
pub struct CertificatePair {
    /// End-entity X.509 certificate
    pub certificate: X509,
    /// Private key matching `certificate`
    pub private_key: PKey<Private>,
    /// Intermediate CA certificates embedded alongside the signer
    pub intermediates: Vec<X509>,
}

impl fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificatePair")
            .field("certificate", &format_name(self.certificate.subject_name()))
            .field("private_key", &"<redacted>")
            .field("intermediates", &self.intermediates.len())
            .finish()
    }
}

impl CertificatePair {
    /// Build a pair from already-parsed parts, checking that they match.
    pub fn new(certificate: X509, private_key: PKey<Private>) -> Result<Self> {
        Self::validate_key_pair(&certificate, &private_key)?;
        Ok(Self {
            certificate,
            private_key,
            intermediates: Vec::new(),
        })
    }

    /// Load from certificate and private key files.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if either file is missing
    /// - [`Error::Malformed`] if no certificate or key block can be parsed
    /// - [`Error::Certificate`] for encrypted keys
    /// - [`Error::Mismatch`] if the key does not belong to the certificate
    pub fn from_pem_files(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        let cert_data = read_input("certificate", cert_path)?;
        let key_data = read_input("private key", key_path)?;

        debug!(cert = %cert_path.display(), key = %key_path.display(), "loading certificate pair");
        Self::from_pem(&cert_data, &key_data)
    }

    /// Load from in-memory PEM (or DER) certificate and key data.
    ///
    /// Every `CERTIFICATE` block after the first in `cert_data` is treated
    /// as an intermediate.
    pub fn from_pem(cert_data: &[u8], key_data: &[u8]) -> Result<Self> {
        let mut certs = parse_certificates(cert_data)?.into_iter();
        let certificate = certs
            .next()
            .ok_or_else(|| Error::Malformed("no certificate found".into()))?;
        let private_key = parse_private_key(key_data)?;

        let mut pair = Self::new(certificate, private_key)?;
        pair.intermediates.extend(certs);
        Ok(pair)
    }

    /// Append every certificate in the file at `path` to the intermediates.
    pub fn add_intermediates_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = read_input("intermediate certificate", path)?;
        let certs = parse_certificates(&data)?;
        if certs.is_empty() {
            return Err(Error::Malformed(format!(
                "no certificate found in {}",
                path.display()
            )));
        }
        debug!(count = certs.len(), path = %path.display(), "added intermediate certificates");
        self.intermediates.extend(certs);
        Ok(())
    }

    /// Validate that the private key matches the certificate's public key
    fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
        let cert_public_key = cert.public_key().map_err(|e| {
            Error::Certificate(format!(
                "Failed to extract public key from certificate: {}",
                e
            ))
        })?;

        if !private_key.public_eq(&cert_public_key) {
            return Err(Error::Mismatch(
                "Private key does not match certificate public key".into(),
            ));
        }

        Ok(())
    }
}

fn read_input(what: &'static str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(what, path),
        _ => Error::Io(e),
    })
}

/// Parse all certificates, scanning PEM delimiters first and falling back
/// to OpenSSL's PEM and DER readers.
fn parse_certificates(data: &[u8]) -> Result<Vec<X509>> {
    let blocks = pem::parse_blocks_labeled(data, "CERTIFICATE")?;
    if !blocks.is_empty() {
        return blocks
            .iter()
            .map(|b| {
                X509::from_der(&b.der)
                    .map_err(|e| Error::Malformed(format!("invalid certificate: {e}")))
            })
            .collect();
    }

    if let Ok(stack) = X509::stack_from_pem(data) {
        if !stack.is_empty() {
            return Ok(stack);
        }
    }

    X509::from_der(data)
        .map(|cert| vec![cert])
        .map_err(|_| Error::Malformed("no certificate block found".into()))
}

/// Parse the first recognizable private key.
///
/// Accepts PKCS#8 (`PRIVATE KEY`), PKCS#1 (`RSA PRIVATE KEY`) and SEC1
/// (`EC PRIVATE KEY`) blocks. Encrypted keys are rejected.
fn parse_private_key(data: &[u8]) -> Result<PKey<Private>> {
    for block in pem::parse_blocks(data)? {
        if let Some(key) = key_from_block(&block)? {
            return Ok(key);
        }
    }

    PKey::private_key_from_pem(data)
        .or_else(|_| PKey::private_key_from_der(data))
        .map_err(|_| {
            Error::Malformed(
                "no recognizable private key block (expected PRIVATE KEY, RSA PRIVATE KEY or EC PRIVATE KEY)"
                    .into(),
            )
        })
}

fn key_from_block(block: &PemBlock) -> Result<Option<PKey<Private>>> {
    let is_key = block.label.ends_with("PRIVATE KEY");
    if is_key && block.encrypted {
        return Err(Error::Certificate(
            "Encrypted private keys are not supported; decrypt the key first".into(),
        ));
    }

    let key = match block.label.as_str() {
        "PRIVATE KEY" => PKey::private_key_from_pkcs8(&block.der),
        "RSA PRIVATE KEY" => Rsa::private_key_from_der(&block.der).and_then(PKey::from_rsa),
        "EC PRIVATE KEY" => EcKey::private_key_from_der(&block.der).and_then(PKey::from_ec_key),
        _ => return Ok(None),
    };

    key.map(Some)
        .map_err(|e| Error::Malformed(format!("invalid {} block: {e}", block.label)))
}
