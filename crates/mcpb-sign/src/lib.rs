//! Signing, verification, and signature removal for MCP bundles.
//!
//! A signed bundle is an unmodified archive followed by a trailing
//! [`envelope`] that carries a detached CMS/PKCS#7 signature over the
//! archive bytes. Stripping the envelope gives back the original archive
//! exactly.
//!
//! Verification only checks that the signature matches the content and the
//! certificate embedded in it. There is no trust-chain validation against
//! a root store; callers that need it must add it.
//!
//! All operations are synchronous, work on one file, and hold the whole
//! bundle in memory. Nothing locks the bundle on disk.

pub mod archive;
pub mod builder;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod inspect;
pub mod io;

pub use builder::{BundleSigner, SignReport};
pub use crypto::{CertificatePair, SelfSignedConfig, SignerInfo};
pub use error::{Error, ErrorKind};
pub use inspect::{
    bundle_info, unsign_bundle, verify_bundle, BundleInfo, UnsignOutcome, VerifyOutcome,
};

pub type Result<T> = std::result::Result<T, Error>;
