//! Signature envelope appended to bundle archives.
//!
//! A signed bundle is the untouched archive followed by a trailing envelope
//! carrying a DER-encoded detached CMS signature. Removing the envelope
//! reproduces the archive byte for byte; a file without an envelope is a
//! plain archive.

pub mod codec;
pub mod constants;

pub use codec::{decode, displaced_envelope, encode, strip, Decoded};
pub use constants::{DISPLACED_SLACK, FOOTER, HEADER, LENGTH_PREFIX_SIZE};
