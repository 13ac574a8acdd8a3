//! Process exit codes. Part of the public contract of the `mcpb-sign` binary.
//! Argument errors exit with clap's own code (2).

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1; // Missing input, bad credentials, invalid signature, I/O
pub const NOT_SIGNED: u8 = 3; // `verify` on a bundle without a signature
