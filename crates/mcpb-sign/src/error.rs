//! Error types for bundle signing operations.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases
//! when loading credentials, building or checking signatures, and reading
//! or writing bundles. [`Error::kind`] folds the variants onto the coarse
//! [`ErrorKind`] taxonomy the command layer reports as an `error[...]` tag.
//!
//! A bundle without a signature is *not* an error. The verify, info and
//! unsign operations report it through their outcome types instead.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for bundle signing operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
///
/// # Examples
///
/// ```no_run
/// use mcpb_sign::{BundleSigner, Error};
///
/// let result = BundleSigner::new()
///     .certificate("cert.pem")
///     .private_key("key.pem")
///     .sign("server.mcpb");
/// match result {
///     Ok(report) => println!("Signed by {}", report.signer.subject),
///     Err(Error::NotFound { what, path }) => eprintln!("missing {what}: {}", path.display()),
///     Err(Error::Mismatch(msg)) => eprintln!("key mismatch: {msg}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An input file (bundle, certificate, key, or directory) does not exist.
    #[error("{what} not found: {}", path.display())]
    NotFound {
        /// What the caller was trying to read, e.g. `"certificate"`.
        what: &'static str,
        /// The path that was looked up.
        path: PathBuf,
    },

    /// PEM or DER data could not be parsed.
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Key does not match certificate, or a signature failed verification.
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// Invalid or unsupported certificate or private key.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Building the detached signature failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid builder or generator configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing was attempted without a certificate/key pair.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// ZIP archive operation failed while packing a bundle.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Low-level OpenSSL failure.
    #[error("OpenSSL error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
}

/// Coarse failure classification shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input archive, certificate, or key file missing.
    NotFound,
    /// Unparseable PEM or DER.
    Malformed,
    /// Key/certificate mismatch or failed cryptographic verification.
    Mismatch,
    /// Anything else (I/O, configuration, OpenSSL internals).
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } | Error::MissingCredentials(_) => ErrorKind::NotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Malformed(_) | Error::Certificate(_) => ErrorKind::Malformed,
            Error::Mismatch(_) => ErrorKind::Mismatch,
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Error::NotFound {
            what,
            path: path.into(),
        }
    }
}
