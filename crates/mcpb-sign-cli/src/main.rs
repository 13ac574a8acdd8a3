//! Command-line interface for MCP bundle signing.
//!
//! Signs bundles with a PEM certificate and key (or a generated self-signed
//! pair), verifies and inspects signed bundles, removes signatures, and
//! packs directories into unsigned bundles.

mod exit_codes;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use mcpb_sign::archive::{pack_directory, CompressionLevel};
use mcpb_sign::{
    bundle_info, unsign_bundle, verify_bundle, BundleSigner, ErrorKind, SelfSignedConfig,
    SignerInfo, UnsignOutcome, VerifyOutcome,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcpb-sign", version)]
#[command(about = "Sign, verify and inspect MCP bundles")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a bundle in place, replacing any existing signature
    Sign(SignArgs),
    /// Verify a bundle's signature
    Verify {
        /// Bundle file
        file: PathBuf,
    },
    /// Show size and signer details of a bundle
    Info {
        /// Bundle file
        file: PathBuf,
    },
    /// Remove the signature from a bundle
    Unsign {
        /// Bundle file
        file: PathBuf,
    },
    /// Zip a directory into an unsigned bundle
    Pack {
        /// Directory to pack
        directory: PathBuf,
        /// Output file (default: <directory>.mcpb next to the directory)
        output: Option<PathBuf>,
        /// ZIP compression level (0-9)
        #[arg(short = 'z', long, default_value = "6")]
        compression: u32,
    },
}

#[derive(Args)]
struct SignArgs {
    /// Bundle file
    file: PathBuf,

    /// Certificate file (PEM) [default: cert.pem, or mcpb-self-signed-cert.pem with --self-signed]
    #[arg(short = 'c', long)]
    cert: Option<PathBuf>,

    /// Private key file (PEM) [default: key.pem, or mcpb-self-signed-key.pem with --self-signed]
    #[arg(short = 'k', long)]
    key: Option<PathBuf>,

    /// Intermediate certificate file to embed (repeatable)
    #[arg(short = 'i', long = "intermediate")]
    intermediates: Vec<PathBuf>,

    /// Generate a self-signed certificate if the certificate or key is missing
    #[arg(long)]
    self_signed: bool,

    /// Common name for a generated self-signed certificate
    #[arg(long, requires = "self_signed")]
    common_name: Option<String>,

    /// Validity in days for a generated self-signed certificate
    #[arg(long, requires = "self_signed")]
    validity_days: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match error_tag(&e) {
                Some(tag) => eprintln!("error[{tag}]: {e:#}"),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::from(exit_codes::FAILURE)
        }
    }
}

/// Short class of a library error, for the `error[...]` prefix.
fn error_tag(e: &anyhow::Error) -> Option<&'static str> {
    match e.downcast_ref::<mcpb_sign::Error>()?.kind() {
        ErrorKind::NotFound => Some("not-found"),
        ErrorKind::Malformed => Some("malformed"),
        ErrorKind::Mismatch => Some("mismatch"),
        ErrorKind::Other => None,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<u8> {
    match command {
        Command::Sign(args) => sign(args),
        Command::Verify { file } => verify(&file),
        Command::Info { file } => info(&file),
        Command::Unsign { file } => unsign(&file),
        Command::Pack {
            directory,
            output,
            compression,
        } => pack(&directory, output, compression),
    }
}

fn sign(args: SignArgs) -> Result<u8> {
    let mut signer = BundleSigner::new();

    if args.self_signed {
        let mut config = SelfSignedConfig::default();
        if let Some(cn) = args.common_name {
            config.common_name = cn;
        }
        if let Some(days) = args.validity_days {
            config.validity_days = days;
        }
        signer = signer.self_signed(config);
        if let Some(cert) = &args.cert {
            signer = signer.certificate(cert);
        }
        if let Some(key) = &args.key {
            signer = signer.private_key(key);
        }
    } else {
        signer = signer
            .certificate(args.cert.unwrap_or_else(|| PathBuf::from("cert.pem")))
            .private_key(args.key.unwrap_or_else(|| PathBuf::from("key.pem")));
    }

    for intermediate in &args.intermediates {
        signer = signer.intermediate(intermediate);
    }

    let report = signer
        .sign(&args.file)
        .with_context(|| format!("failed to sign {}", args.file.display()))?;

    println!("Signed {}", args.file.display());
    if report.replaced_existing {
        println!("  (replaced existing signature)");
    }
    println!("  Subject:     {}", report.signer.subject);
    println!("  Issuer:      {}", report.signer.issuer);
    warn_self_signed(&report.signer);
    Ok(exit_codes::SUCCESS)
}

fn verify(file: &Path) -> Result<u8> {
    match verify_bundle(file).with_context(|| format!("failed to verify {}", file.display()))? {
        VerifyOutcome::Unsigned => {
            println!("{} is not signed", file.display());
            Ok(exit_codes::NOT_SIGNED)
        }
        VerifyOutcome::Invalid => Err(anyhow!(
            "signature verification failed for {}: the signature does not match the bundle contents",
            file.display()
        )),
        VerifyOutcome::Valid(signer) => {
            println!("Signature is valid: {}", file.display());
            println!("{signer}");
            warn_self_signed(&signer);
            println!("Note: the certificate chain was not validated against a trust store.");
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn info(file: &Path) -> Result<u8> {
    let info = bundle_info(file).with_context(|| format!("failed to read {}", file.display()))?;

    println!("File:        {}", file.display());
    println!("Size:        {} bytes", info.file_len);

    match &info.status {
        VerifyOutcome::Unsigned => {
            println!("Signed:      no");
            Ok(exit_codes::SUCCESS)
        }
        VerifyOutcome::Invalid => {
            println!("Signed:      yes");
            println!("Content:     {} bytes", info.content_len);
            println!("Signature:   {} bytes (INVALID)", info.envelope_len);
            Err(anyhow!("signature of {} is invalid", file.display()))
        }
        VerifyOutcome::Valid(signer) => {
            println!("Signed:      yes");
            println!("Content:     {} bytes", info.content_len);
            println!("Signature:   {} bytes (valid)", info.envelope_len);
            println!("Payload:     {} bytes", info.payload_len);
            println!("Signer:");
            println!("{signer}");
            if signer.currently_valid {
                println!("  Certificate is within its validity window");
            } else {
                println!("  Certificate is outside its validity window");
            }
            warn_self_signed(signer);
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn unsign(file: &Path) -> Result<u8> {
    match unsign_bundle(file).with_context(|| format!("failed to unsign {}", file.display()))? {
        UnsignOutcome::NotSigned => {
            eprintln!("warning: {} is not signed; nothing to remove", file.display());
        }
        UnsignOutcome::Removed { envelope_len } => {
            println!(
                "Removed signature from {} ({envelope_len} bytes)",
                file.display()
            );
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn pack(directory: &Path, output: Option<PathBuf>, compression: u32) -> Result<u8> {
    let output = match output {
        Some(path) => path,
        None => default_pack_output(directory)?,
    };

    let summary = pack_directory(directory, &output, CompressionLevel::new(compression))
        .with_context(|| format!("failed to pack {}", directory.display()))?;

    println!(
        "Packed {} files into {} ({} bytes)",
        summary.files,
        output.display(),
        summary.archive_len
    );
    Ok(exit_codes::SUCCESS)
}

fn default_pack_output(directory: &Path) -> Result<PathBuf> {
    let dir = directory
        .canonicalize()
        .with_context(|| format!("directory not found: {}", directory.display()))?;
    let name = dir
        .file_name()
        .ok_or_else(|| anyhow!("cannot derive a bundle name from {}", dir.display()))?
        .to_string_lossy()
        .into_owned();
    Ok(dir.with_file_name(format!("{name}.mcpb")))
}

fn warn_self_signed(signer: &SignerInfo) {
    if signer.self_signed {
        eprintln!("warning: signed with a self-signed certificate; it is not trusted by default");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_args() {
        let cli = Cli::try_parse_from([
            "mcpb-sign",
            "sign",
            "server.mcpb",
            "--cert",
            "c.pem",
            "--key",
            "k.pem",
            "--intermediate",
            "a.pem",
            "--intermediate",
            "b.pem",
        ])
        .unwrap();

        let Command::Sign(args) = cli.command else {
            panic!("expected sign");
        };
        assert_eq!(args.file, PathBuf::from("server.mcpb"));
        assert_eq!(args.cert, Some(PathBuf::from("c.pem")));
        assert_eq!(args.intermediates.len(), 2);
        assert!(!args.self_signed);
    }

    #[test]
    fn test_common_name_requires_self_signed() {
        let result = Cli::try_parse_from(["mcpb-sign", "sign", "x.mcpb", "--common-name", "Dev"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_tag_follows_library_kind() {
        let not_found = anyhow::Error::new(mcpb_sign::Error::MissingCredentials("no key".into()))
            .context("failed to sign x.mcpb");
        assert_eq!(error_tag(&not_found), Some("not-found"));

        let mismatch = anyhow::Error::new(mcpb_sign::Error::Mismatch("wrong key".into()));
        assert_eq!(error_tag(&mismatch), Some("mismatch"));

        let other = anyhow::Error::new(mcpb_sign::Error::Config("bad".into()));
        assert_eq!(error_tag(&other), None);
        assert_eq!(error_tag(&anyhow!("invalid signature")), None);
    }

    #[test]
    fn test_default_pack_output_is_sibling() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("server");
        std::fs::create_dir(&dir).unwrap();

        let output = default_pack_output(&dir).unwrap();
        assert_eq!(output.file_name().unwrap(), "server.mcpb");
        assert_eq!(output.parent(), dir.canonicalize().unwrap().parent());
    }
}
