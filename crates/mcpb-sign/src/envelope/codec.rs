//! Envelope encoding and decoding
//!
//! ## Structure
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Archive content (N bytes, opaque)  │
//! ├────────────────────────────────────┤
//! │ HEADER  "MCPB_SIG_V1" (11 bytes)   │
//! ├────────────────────────────────────┤
//! │ payload length, u32 LE (4 bytes)   │
//! ├────────────────────────────────────┤
//! │ DER detached CMS SignedData        │
//! ├────────────────────────────────────┤
//! │ FOOTER  "MCPB_SIG_END" (12 bytes)  │
//! └────────────────────────────────────┘
//! ```
//!
//! Decoding never fails. The envelope must end the file, and the header is
//! located by scanning backward from the footer: the nearest header whose
//! length prefix spans exactly to the footer wins. The archive may contain
//! either marker by coincidence, and a signature payload may too, so only
//! this structurally consistent match counts. Anything else (missing
//! markers, a length running past the footer, trailing bytes after the
//! footer) is reported as unsigned with the whole file as content.
//!
//! A signed file that picks up a few trailing bytes (a newline appended in
//! transit, say) therefore decodes as unsigned. [`displaced_envelope`]
//! detects that case so signing can refuse instead of nesting a second
//! envelope after the first.

use super::constants::{DISPLACED_SLACK, ENVELOPE_OVERHEAD, FOOTER, HEADER, LENGTH_PREFIX_SIZE};
use crate::{Error, Result};
use std::ops::Range;
use tracing::debug;

/// A file split into archive content and an optional signature payload.
///
/// Borrowed from the input buffer; nothing is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<'a> {
    /// Bytes preceding the envelope, or the whole file when unsigned.
    pub content: &'a [u8],
    /// The DER signature payload, if an envelope was found.
    pub payload: Option<&'a [u8]>,
}

impl<'a> Decoded<'a> {
    /// Whether an envelope was found.
    pub fn is_signed(&self) -> bool {
        self.payload.is_some()
    }

    /// Size of the envelope including markers, or 0 when unsigned.
    pub fn envelope_len(&self) -> usize {
        self.payload.map_or(0, |p| p.len() + ENVELOPE_OVERHEAD)
    }
}

/// Append an envelope carrying `payload` to `content`.
///
/// `content` is taken verbatim. Callers re-signing a bundle pass the output
/// of [`strip`] so a file never carries more than one envelope.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the payload does not fit the 32-bit length
/// prefix.
pub fn encode(content: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        Error::Signing(format!(
            "signature payload of {} bytes exceeds the envelope length field",
            payload.len()
        ))
    })?;

    let mut out = Vec::with_capacity(content.len() + payload.len() + ENVELOPE_OVERHEAD);
    out.extend_from_slice(content);
    out.extend_from_slice(HEADER);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(FOOTER);

    debug!(
        content_len = content.len(),
        payload_len = payload.len(),
        "encoded signature envelope"
    );
    Ok(out)
}

/// Split `file` into content and signature payload.
///
/// Returns `payload: None` with `content == file` when no well-formed
/// envelope terminates the file.
pub fn decode(file: &[u8]) -> Decoded<'_> {
    match locate(file) {
        Some((header_at, payload)) => {
            debug!(
                header_at,
                payload_len = payload.len(),
                "found signature envelope"
            );
            Decoded {
                content: &file[..header_at],
                payload: Some(&file[payload]),
            }
        }
        None => Decoded {
            content: file,
            payload: None,
        },
    }
}

/// Archive content of `file` with any envelope removed.
pub fn strip(file: &[u8]) -> &[u8] {
    decode(file).content
}

/// Number of trailing bytes after a well-formed envelope that does not end
/// the file.
///
/// Returns `None` when `file` decodes as signed, or when no complete
/// envelope ends within [`DISPLACED_SLACK`] bytes of the end.
pub fn displaced_envelope(file: &[u8]) -> Option<usize> {
    if locate(file).is_some() {
        return None;
    }

    let tail_start = file.len().saturating_sub(DISPLACED_SLACK + FOOTER.len());
    let footer_at = tail_start + rfind(&file[tail_start..], FOOTER)?;
    let envelope_end = footer_at + FOOTER.len();

    locate(&file[..envelope_end])?;
    Some(file.len() - envelope_end)
}

/// Returns the header offset and payload range of the trailing envelope.
fn locate(file: &[u8]) -> Option<(usize, Range<usize>)> {
    let footer_at = file.len().checked_sub(FOOTER.len())?;
    if &file[footer_at..] != FOOTER {
        return None;
    }

    let mut search_end = footer_at;
    while let Some(header_at) = rfind(&file[..search_end], HEADER) {
        let len_at = header_at + HEADER.len();
        let payload_start = len_at + LENGTH_PREFIX_SIZE;

        if payload_start <= footer_at {
            let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
            prefix.copy_from_slice(&file[len_at..payload_start]);
            let declared = usize::try_from(u32::from_le_bytes(prefix)).ok()?;

            if payload_start.checked_add(declared) == Some(footer_at) {
                return Some((header_at, payload_start..footer_at));
            }
            debug!(
                header_at,
                declared,
                available = footer_at - payload_start,
                "length prefix inconsistent with footer position"
            );
        }

        search_end = header_at;
    }

    None
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
