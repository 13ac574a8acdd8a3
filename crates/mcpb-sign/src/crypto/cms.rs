//! Detached CMS/PKCS#7 SignedData over bundle content
//!
//! Signing embeds the end-entity certificate and any intermediates, never
//! the key. The content itself is not embedded; the verifier is handed the
//! stripped archive separately.
//!
//! Verification checks the message digest and the signature against the
//! embedded signer certificate only. **No certificate chain is built or
//! checked against a trust store.** A valid result means "these bytes were
//! signed by the holder of this certificate's key", nothing more.

use super::assets::CertificatePair;
use super::cert::SignerInfo;
use crate::{Error, Result};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use tracing::debug;

/// Outcome of [`verify_detached`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Digest and signature both check out.
    pub valid: bool,
    /// Metadata of the signer certificate; `None` whenever `valid` is false.
    pub signer: Option<SignerInfo>,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            signer: None,
        }
    }
}

/// Sign `content` and return the DER-encoded detached SignedData.
///
/// The digest is chosen by OpenSSL from the key type, which is SHA-256 for
/// RSA and P-256 keys.
///
/// # Errors
///
/// Returns [`Error::Signing`] if OpenSSL cannot produce the structure.
pub fn sign_detached(content: &[u8], pair: &CertificatePair) -> Result<Vec<u8>> {
    let mut chain = Stack::<X509>::new()?;
    for cert in &pair.intermediates {
        chain.push(cert.clone())?;
    }

    let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOSMIMECAP;
    let signed = Pkcs7::sign(&pair.certificate, &pair.private_key, &chain, content, flags)
        .map_err(|e| Error::Signing(format!("Failed to build CMS signature: {e}")))?;

    let der = signed
        .to_der()
        .map_err(|e| Error::Signing(format!("Failed to encode CMS signature: {e}")))?;

    debug!(
        content_len = content.len(),
        payload_len = der.len(),
        intermediates = pair.intermediates.len(),
        "built detached signature"
    );
    Ok(der)
}

/// Verify `payload` as a detached signature over `content`.
///
/// Never fails: malformed DER, a digest mismatch or a bad signature all
/// produce `valid: false` with no signer.
pub fn verify_detached(content: &[u8], payload: &[u8]) -> Verification {
    match check(content, payload) {
        Ok(signer) => Verification {
            valid: true,
            signer: Some(signer),
        },
        Err(e) => {
            debug!(error = %e, "signature verification failed");
            Verification::invalid()
        }
    }
}

fn check(content: &[u8], payload: &[u8]) -> Result<SignerInfo> {
    let pkcs7 = Pkcs7::from_der(payload)
        .map_err(|e| Error::Malformed(format!("signature is not valid DER SignedData: {e}")))?;

    let no_extra_certs = Stack::<X509>::new()?;
    let empty_store = X509StoreBuilder::new()?.build();
    // NOVERIFY skips chain building against the (empty) store.
    let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOVERIFY;

    pkcs7
        .verify(&no_extra_certs, &empty_store, Some(content), None, flags)
        .map_err(|e| Error::Mismatch(format!("signature does not match content: {e}")))?;

    let signers = pkcs7.signers(&no_extra_certs, flags)?;
    let signer = signers
        .iter()
        .next()
        .ok_or_else(|| Error::Malformed("signature carries no signer certificate".into()))?;

    SignerInfo::from_certificate(signer)
}
