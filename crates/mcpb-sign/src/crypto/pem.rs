//! PEM block scanning.
//!
//! Locates `-----BEGIN <LABEL>-----` / `-----END <LABEL>-----` pairs and
//! base64-decodes the body between them. This is the primary path for
//! reading certificates and keys; OpenSSL's own PEM readers are only used
//! as a fallback, since their leniency differs between library versions.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

/// A single decoded PEM block.
#[derive(Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label between `BEGIN` and the closing dashes, e.g. `"CERTIFICATE"`.
    pub label: String,
    /// Base64-decoded body.
    pub der: Vec<u8>,
    /// Whether the body carried RFC 1421 headers marking it as encrypted.
    pub encrypted: bool,
}

impl std::fmt::Debug for PemBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bodies may hold private keys.
        f.debug_struct("PemBlock")
            .field("label", &self.label)
            .field("der_len", &self.der.len())
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

/// Parse every PEM block in `data`, in order of appearance.
///
/// Text outside of blocks (comments, `openssl x509 -text` dumps, bag
/// attributes) is skipped. Non-UTF-8 input yields no blocks.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if a `BEGIN` line has no matching `END`
/// line or a body is not valid base64.
pub fn parse_blocks(data: &[u8]) -> Result<Vec<PemBlock>> {
    let Ok(text) = std::str::from_utf8(data) else {
        return Ok(Vec::new());
    };

    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(begin) = rest.find(BEGIN) {
        let after_begin = &rest[begin + BEGIN.len()..];
        let label_end = after_begin
            .find(DASHES)
            .ok_or_else(|| Error::Malformed("unterminated PEM BEGIN line".into()))?;
        let label = &after_begin[..label_end];
        let body_and_rest = &after_begin[label_end + DASHES.len()..];

        let end_marker = format!("{END}{label}{DASHES}");
        let body_end = body_and_rest
            .find(&end_marker)
            .ok_or_else(|| Error::Malformed(format!("missing END line for PEM block {label}")))?;

        blocks.push(decode_body(label, &body_and_rest[..body_end])?);
        rest = &body_and_rest[body_end + end_marker.len()..];
    }

    Ok(blocks)
}

/// Parse only the blocks carrying `label`.
pub fn parse_blocks_labeled(data: &[u8], label: &str) -> Result<Vec<PemBlock>> {
    Ok(parse_blocks(data)?
        .into_iter()
        .filter(|b| b.label == label)
        .collect())
}

fn decode_body(label: &str, body: &str) -> Result<PemBlock> {
    let mut encrypted = false;
    let mut encoded = String::with_capacity(body.len());

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Legacy OpenSSL headers, e.g. "Proc-Type: 4,ENCRYPTED"
        if let Some((key, value)) = line.split_once(':') {
            if key.eq_ignore_ascii_case("Proc-Type") && value.contains("ENCRYPTED") {
                encrypted = true;
            }
            continue;
        }
        encoded.push_str(line);
    }

    let der = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Error::Malformed(format!("invalid base64 in PEM block {label}: {e}")))?;

    Ok(PemBlock {
        label: label.to_string(),
        der,
        encrypted: encrypted || label.starts_with("ENCRYPTED"),
    })
}
