//! Self-signed development certificates.
//!
//! Generates an RSA key and a self-issued, non-CA certificate restricted to
//! digital signatures. Meant for local development; verifiers will flag the
//! result as self-signed.

use super::assets::CertificatePair;
use crate::{Error, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509NameBuilder};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Smallest RSA modulus accepted for generated keys.
pub const MIN_KEY_BITS: u32 = 2048;

/// Default certificate file written by `sign --self-signed`.
pub const DEFAULT_CERT_PATH: &str = "mcpb-self-signed-cert.pem";

/// Default key file written by `sign --self-signed`.
pub const DEFAULT_KEY_PATH: &str = "mcpb-self-signed-key.pem";

/// Parameters for [`create_self_signed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfSignedConfig {
    /// Subject and issuer common name.
    pub common_name: String,
    /// Subject organization (`O`).
    pub organization: Option<String>,
    /// Subject country (`C`), two letters.
    pub country: Option<String>,
    /// Days from now until the certificate expires.
    pub validity_days: u32,
    /// How far `notBefore` is moved into the past, to absorb verifier clock skew.
    pub backdate_secs: u32,
    /// RSA modulus size.
    pub key_bits: u32,
}

impl Default for SelfSignedConfig {
    fn default() -> Self {
        Self {
            common_name: "MCPB Self-Signed Certificate".to_string(),
            organization: Some("MCPB".to_string()),
            country: Some("US".to_string()),
            validity_days: 3650,
            backdate_secs: 24 * 60 * 60,
            key_bits: 2048,
        }
    }
}

/// Generate a key and a self-signed certificate for it.
///
/// # Errors
///
/// Returns [`Error::Config`] for keys below [`MIN_KEY_BITS`] or a zero
/// validity window, and [`Error::Crypto`] if OpenSSL fails.
pub fn create_self_signed(config: &SelfSignedConfig) -> Result<CertificatePair> {
    if config.key_bits < MIN_KEY_BITS {
        return Err(Error::Config(format!(
            "RSA key size {} is below the minimum of {MIN_KEY_BITS} bits",
            config.key_bits
        )));
    }
    if config.validity_days == 0 {
        return Err(Error::Config("validity_days must be at least 1".into()));
    }

    let private_key = PKey::from_rsa(Rsa::generate(config.key_bits)?)?;

    let mut name_builder = X509NameBuilder::new()?;
    name_builder.append_entry_by_text("CN", &config.common_name)?;
    if let Some(org) = &config.organization {
        name_builder.append_entry_by_text("O", org)?;
    }
    if let Some(country) = &config.country {
        name_builder.append_entry_by_text("C", country)?;
    }
    let name = name_builder.build();

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;

    let mut serial = BigNum::new()?;
    serial.rand(127, MsbOption::MAYBE_ZERO, false)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&private_key)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Config(format!("system clock before UNIX epoch: {e}")))?
        .as_secs();
    let not_before = now.saturating_sub(u64::from(config.backdate_secs));
    let not_before = Asn1Time::from_unix(not_before.try_into().map_err(|_| {
        Error::Config("system clock out of range for certificate validity".into())
    })?)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::days_from_now(config.validity_days)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(KeyUsage::new().critical().digital_signature().build()?)?;
    builder.append_extension(ExtendedKeyUsage::new().code_signing().build()?)?;
    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(ski)?;

    builder.sign(&private_key, MessageDigest::sha256())?;
    let certificate = builder.build();

    info!(
        common_name = %config.common_name,
        key_bits = config.key_bits,
        validity_days = config.validity_days,
        "generated self-signed certificate"
    );
    CertificatePair::new(certificate, private_key)
}

/// Write the certificate and PKCS#8 private key as PEM.
///
/// The key file ends up with mode `0600` on Unix, including when it
/// already existed with a looser mode. Nothing else about the key leaves
/// this function.
pub fn write_pem_files(
    pair: &CertificatePair,
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<()> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let cert_pem = pair.certificate.to_pem()?;
    let key_pem = pair.private_key.private_key_to_pem_pkcs8()?;

    fs::write(cert_path, cert_pem)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut key_file = options.open(key_path)?;
    // `mode` only applies on creation; tighten a pre-existing file before writing.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        key_file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    key_file.write_all(&key_pem)?;
    key_file.sync_all()?;

    warn!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "wrote self-signed certificate; bundles signed with it will not be trusted by default"
    );
    Ok(())
}

/// Load the pair at the given paths, or generate and write one if either
/// file is missing.
pub fn load_or_create(
    config: &SelfSignedConfig,
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<CertificatePair> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    if cert_path.exists() && key_path.exists() {
        info!(cert = %cert_path.display(), "reusing existing self-signed certificate");
        return CertificatePair::from_pem_files(cert_path, key_path);
    }

    let pair = create_self_signed(config)?;
    write_pem_files(&pair, cert_path, key_path)?;
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::nid::Nid;
    use openssl::x509::X509;
    use tempfile::TempDir;

    fn extension_text(cert: &X509) -> String {
        String::from_utf8(cert.to_text().unwrap()).unwrap()
    }

    #[test]
    fn test_create_self_signed_defaults() {
        let pair = create_self_signed(&SelfSignedConfig::default()).unwrap();
        let cert = &pair.certificate;

        let cn = cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string();
        assert_eq!(cn, "MCPB Self-Signed Certificate");
        assert_eq!(pair.private_key.bits(), 2048);

        let text = extension_text(cert);
        assert!(text.contains("CA:FALSE"), "{text}");
        assert!(text.contains("Digital Signature"), "{text}");
        assert!(!text.contains("Certificate Sign"), "{text}");
    }

    #[test]
    fn test_not_before_is_backdated() {
        let pair = create_self_signed(&SelfSignedConfig::default()).unwrap();
        let twelve_hours_ago = Asn1Time::from_unix(
            (SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 12 * 60 * 60)
                .try_into()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(
            pair.certificate
                .not_before()
                .compare(&twelve_hours_ago)
                .unwrap(),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn test_rejects_small_keys() {
        let config = SelfSignedConfig {
            key_bits: 1024,
            ..SelfSignedConfig::default()
        };
        assert!(matches!(create_self_signed(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_validity() {
        let config = SelfSignedConfig {
            validity_days: 0,
            ..SelfSignedConfig::default()
        };
        assert!(matches!(create_self_signed(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_write_and_reload() {
        let temp = TempDir::new().unwrap();
        let cert_path = temp.path().join("cert.pem");
        let key_path = temp.path().join("key.pem");

        let pair = create_self_signed(&SelfSignedConfig::default()).unwrap();
        write_pem_files(&pair, &cert_path, &key_path).unwrap();

        let key_text = fs::read_to_string(&key_path).unwrap();
        assert!(key_text.contains("BEGIN PRIVATE KEY"));
        assert!(!fs::read_to_string(&cert_path)
            .unwrap()
            .contains("PRIVATE KEY"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let reloaded = CertificatePair::from_pem_files(&cert_path, &key_path).unwrap();
        assert_eq!(
            reloaded.certificate.to_der().unwrap(),
            pair.certificate.to_der().unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_regenerate_tightens_existing_key_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let cert_path = temp.path().join("cert.pem");
        let key_path = temp.path().join("key.pem");
        fs::write(&key_path, b"stale").unwrap();
        fs::set_permissions(&key_path, fs::Permissions::from_mode(0o644)).unwrap();

        load_or_create(&SelfSignedConfig::default(), &cert_path, &key_path).unwrap();

        let mode = fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(fs::read_to_string(&key_path)
            .unwrap()
            .contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn test_load_or_create_reuses_existing() {
        let temp = TempDir::new().unwrap();
        let cert_path = temp.path().join("cert.pem");
        let key_path = temp.path().join("key.pem");
        let config = SelfSignedConfig::default();

        let first = load_or_create(&config, &cert_path, &key_path).unwrap();
        let second = load_or_create(&config, &cert_path, &key_path).unwrap();

        assert_eq!(
            first.certificate.to_der().unwrap(),
            second.certificate.to_der().unwrap()
        );
    }
}
