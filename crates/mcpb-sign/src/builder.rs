//! Bundle signing builder API
//!
//! Collects credential paths, then signs a bundle in place: any existing
//! envelope is stripped, the remaining archive is signed, and the file is
//! rewritten once with exactly one envelope.

use crate::crypto::self_signed::{self, SelfSignedConfig};
use crate::crypto::{sign_detached, verify_detached, CertificatePair, SignerInfo};
use crate::envelope;
use crate::io::{read_bundle, write_atomic};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bundle signer with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use mcpb_sign::BundleSigner;
///
/// let report = BundleSigner::new()
///     .certificate("cert.pem")
///     .private_key("key.pem")
///     .intermediate("intermediate.pem")
///     .sign("server.mcpb")?;
/// println!("signed by {}", report.signer.subject);
/// # Ok::<(), mcpb_sign::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BundleSigner {
    certificate: Option<PathBuf>,
    private_key: Option<PathBuf>,
    intermediates: Vec<PathBuf>,
    self_signed: Option<SelfSignedConfig>,
}

/// Result of a successful [`BundleSigner::sign`].
#[derive(Debug, Clone)]
pub struct SignReport {
    /// Signer metadata, read back from the written file.
    pub signer: SignerInfo,
    /// Whether a previous signature was replaced.
    pub replaced_existing: bool,
    /// Length of the signed archive content.
    pub content_len: usize,
    /// Length of the DER signature payload.
    pub payload_len: usize,
}

impl BundleSigner {
    /// Create a new signer builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set certificate file path (PEM or DER).
    ///
    /// Additional `CERTIFICATE` blocks in the same file become intermediates.
    pub fn certificate(mut self, path: impl AsRef<Path>) -> Self {
        self.certificate = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set private key file path (PKCS#8, PKCS#1 or SEC1 PEM, or DER).
    pub fn private_key(mut self, path: impl AsRef<Path>) -> Self {
        self.private_key = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add an intermediate certificate file. May be called repeatedly.
    pub fn intermediate(mut self, path: impl AsRef<Path>) -> Self {
        self.intermediates.push(path.as_ref().to_path_buf());
        self
    }

    /// Generate a self-signed certificate when the configured certificate
    /// or key file does not exist yet.
    ///
    /// Without explicit paths the pair is written to
    /// [`self_signed::DEFAULT_CERT_PATH`] and [`self_signed::DEFAULT_KEY_PATH`].
    pub fn self_signed(mut self, config: SelfSignedConfig) -> Self {
        self.self_signed = Some(config);
        self
    }

    /// Validate the builder configuration.
    pub fn validate(&self) -> Result<()> {
        if self.self_signed.is_some() {
            return Ok(());
        }

        match (&self.certificate, &self.private_key) {
            (Some(_), Some(_)) => Ok(()),
            (None, None) => Err(Error::MissingCredentials(
                "Must specify a certificate/key pair or request a self-signed certificate".into(),
            )),
            _ => Err(Error::MissingCredentials(
                "Both certificate and private key must be specified".into(),
            )),
        }
    }

    /// Load (or generate) the certificate pair this builder describes.
    pub fn load_pair(&self) -> Result<CertificatePair> {
        self.validate()?;

        let mut pair = match &self.self_signed {
            Some(config) => {
                let cert = self
                    .certificate
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(self_signed::DEFAULT_CERT_PATH));
                let key = self
                    .private_key
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(self_signed::DEFAULT_KEY_PATH));
                self_signed::load_or_create(config, cert, key)?
            }
            None => {
                let cert = self
                    .certificate
                    .as_ref()
                    .ok_or_else(|| Error::MissingCredentials("No certificate configured".into()))?;
                let key = self
                    .private_key
                    .as_ref()
                    .ok_or_else(|| Error::MissingCredentials("No private key configured".into()))?;
                CertificatePair::from_pem_files(cert, key)?
            }
        };

        for path in &self.intermediates {
            pair.add_intermediates_file(path)?;
        }

        Ok(pair)
    }

    /// Sign the bundle at `bundle` in place.
    ///
    /// The new file is checked in memory before it is written and read back
    /// afterwards. If either check fails the original bytes stay on disk.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the bundle or a credential file is missing
    /// - [`Error::Malformed`] / [`Error::Certificate`] for unusable credentials
    /// - [`Error::Mismatch`] if the key does not match the certificate or the
    ///   self-check fails
    /// - [`Error::Malformed`] if an envelope sits just before trailing bytes,
    ///   since signing would nest a second envelope after it
    pub fn sign(&self, bundle: impl AsRef<Path>) -> Result<SignReport> {
        let bundle = bundle.as_ref();
        self.validate()?;

        let original = read_bundle(bundle)?;
        let decoded = envelope::decode(&original);
        let content = decoded.content;
        let replaced_existing = decoded.is_signed();
        if let Some(trailing) = envelope::displaced_envelope(&original) {
            return Err(Error::Malformed(format!(
                "{} has {trailing} bytes after its signature envelope; remove them before signing",
                bundle.display()
            )));
        }
        if replaced_existing {
            debug!(
                envelope_len = decoded.envelope_len(),
                "replacing existing signature"
            );
        }

        let pair = self.load_pair()?;
        let payload = sign_detached(content, &pair)?;
        let signed = envelope::encode(content, &payload)?;
        self_check(&signed, content)?;

        write_atomic(bundle, &signed)?;

        let written = read_bundle(bundle)?;
        let signer = match self_check(&written, content) {
            Ok(signer) => signer,
            Err(e) => {
                warn!(path = %bundle.display(), "signed bundle failed read-back check, restoring original");
                write_atomic(bundle, &original)?;
                return Err(e);
            }
        };

        info!(
            path = %bundle.display(),
            subject = %signer.subject,
            replaced_existing,
            "bundle signed"
        );
        Ok(SignReport {
            signer,
            replaced_existing,
            content_len: content.len(),
            payload_len: payload.len(),
        })
    }
}

/// Decode `file`, confirm it strips back to `content`, and verify it.
fn self_check(file: &[u8], content: &[u8]) -> Result<SignerInfo> {
    let decoded = envelope::decode(file);
    let payload = decoded
        .payload
        .ok_or_else(|| Error::Mismatch("signed bundle has no readable envelope".into()))?;
    if decoded.content != content {
        return Err(Error::Mismatch(
            "signed bundle does not strip back to the original content".into(),
        ));
    }

    verify_detached(decoded.content, payload)
        .signer
        .ok_or_else(|| Error::Mismatch("freshly written signature failed verification".into()))
}
