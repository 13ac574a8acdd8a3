//! Certificates, keys, and detached CMS signatures.

pub mod assets;
pub mod cert;
pub mod cms;
pub mod pem;
pub mod self_signed;

pub use assets::CertificatePair;
pub use cert::SignerInfo;
pub use cms::{sign_detached, verify_detached, Verification};
pub use self_signed::{create_self_signed, SelfSignedConfig};
