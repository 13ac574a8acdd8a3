//! Read-only inspection and signature removal.
//!
//! `verify` and `info` never modify the bundle. `unsign` rewrites it only
//! when an envelope is present. A bundle without an envelope is reported
//! through the outcome types, never as an error.

use crate::crypto::{verify_detached, SignerInfo};
use crate::envelope;
use crate::io::{read_bundle, write_atomic};
use crate::Result;
use std::path::Path;
use tracing::{info, warn};

/// Signature state of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No envelope present.
    Unsigned,
    /// An envelope is present but the signature does not check out.
    Invalid,
    /// The signature is valid for the bundle content.
    ///
    /// The signer certificate has not been checked against any trust store.
    Valid(SignerInfo),
}

impl VerifyOutcome {
    fn of(file: &[u8]) -> Self {
        let decoded = envelope::decode(file);
        let Some(payload) = decoded.payload else {
            return VerifyOutcome::Unsigned;
        };

        match verify_detached(decoded.content, payload).signer {
            Some(signer) => VerifyOutcome::Valid(signer),
            None => VerifyOutcome::Invalid,
        }
    }

    /// The signer, when the signature is valid.
    pub fn signer(&self) -> Option<&SignerInfo> {
        match self {
            VerifyOutcome::Valid(signer) => Some(signer),
            _ => None,
        }
    }
}

/// Summary produced by [`bundle_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// Total file size.
    pub file_len: u64,
    /// Size of the archive content without the envelope.
    pub content_len: u64,
    /// Size of the envelope, 0 when unsigned.
    pub envelope_len: u64,
    /// Size of the DER signature payload inside the envelope.
    pub payload_len: u64,
    /// Signature state.
    pub status: VerifyOutcome,
}

impl BundleInfo {
    /// A valid signature made with a self-signed certificate.
    ///
    /// This is a trust warning, not a verification failure.
    pub fn is_self_signed(&self) -> bool {
        self.status.signer().is_some_and(|s| s.self_signed)
    }
}

/// Result of [`unsign_bundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignOutcome {
    /// The bundle had no envelope and was left byte-for-byte unchanged.
    NotSigned,
    /// The envelope was removed.
    Removed {
        /// Bytes dropped from the end of the file.
        envelope_len: usize,
    },
}

/// Verify the signature of the bundle at `path`.
pub fn verify_bundle(path: impl AsRef<Path>) -> Result<VerifyOutcome> {
    let path = path.as_ref();
    let file = read_bundle(path)?;
    let outcome = VerifyOutcome::of(&file);

    match &outcome {
        VerifyOutcome::Unsigned => warn!(path = %path.display(), "bundle is not signed"),
        VerifyOutcome::Invalid => warn!(path = %path.display(), "bundle signature is invalid"),
        VerifyOutcome::Valid(signer) => {
            info!(path = %path.display(), subject = %signer.subject, "bundle signature verified")
        }
    }
    Ok(outcome)
}

/// Describe the bundle at `path`.
pub fn bundle_info(path: impl AsRef<Path>) -> Result<BundleInfo> {
    let file = read_bundle(path)?;
    let decoded = envelope::decode(&file);

    Ok(BundleInfo {
        file_len: file.len() as u64,
        content_len: decoded.content.len() as u64,
        envelope_len: decoded.envelope_len() as u64,
        payload_len: decoded.payload.map_or(0, |p| p.len() as u64),
        status: VerifyOutcome::of(&file),
    })
}

/// Remove the signature from the bundle at `path`.
///
/// An unsigned bundle is not touched.
pub fn unsign_bundle(path: impl AsRef<Path>) -> Result<UnsignOutcome> {
    let path = path.as_ref();
    let file = read_bundle(path)?;
    let decoded = envelope::decode(&file);

    if !decoded.is_signed() {
        warn!(path = %path.display(), "bundle is not signed, leaving it unchanged");
        return Ok(UnsignOutcome::NotSigned);
    }

    write_atomic(path, decoded.content)?;
    info!(path = %path.display(), "signature removed");
    Ok(UnsignOutcome::Removed {
        envelope_len: decoded.envelope_len(),
    })
}
