//! Envelope markers and field sizes
//!
//! These constants define the on-disk layout of version 1 of the
//! signature envelope (binary profile).

/// Marks the start of the envelope.
pub const HEADER: &[u8] = b"MCPB_SIG_V1";

/// Marks the end of the envelope. Always the last bytes of a signed file.
pub const FOOTER: &[u8] = b"MCPB_SIG_END";

/// Width of the little-endian `u32` payload length that follows [`HEADER`].
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Trailing bytes after a footer that still count as a displaced envelope
/// rather than unrelated content.
pub const DISPLACED_SLACK: usize = 64;

/// Bytes the envelope adds on top of the payload itself.
pub const ENVELOPE_OVERHEAD: usize = HEADER.len() + LENGTH_PREFIX_SIZE + FOOTER.len();
