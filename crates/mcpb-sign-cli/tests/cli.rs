use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn mcpb_sign() -> Command {
    let mut cmd = Command::cargo_bin("mcpb-sign").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn source_dir(root: &Path) -> PathBuf {
    let src = root.join("server");
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::write(src.join("manifest.json"), br#"{"name":"hello-world"}"#).unwrap();
    fs::write(src.join("lib/server.py"), b"print('hello')\n").unwrap();
    src
}

fn packed(root: &Path) -> PathBuf {
    let src = source_dir(root);
    let bundle = root.join("hello-world.mcpb");
    mcpb_sign()
        .arg("pack")
        .arg(&src)
        .arg(&bundle)
        .assert()
        .success();
    bundle
}

fn sign_self_signed(root: &Path, bundle: &Path) {
    mcpb_sign()
        .current_dir(root)
        .arg("sign")
        .arg(bundle)
        .arg("--self-signed")
        .args(["--common-name", "CLI Test Signer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed"))
        .stderr(predicate::str::contains("self-signed"));
}

#[test]
fn pack_sign_verify_info_unsign() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    let unsigned = fs::read(&bundle).unwrap();

    sign_self_signed(temp.path(), &bundle);
    assert!(temp.path().join("mcpb-self-signed-cert.pem").exists());
    assert!(temp.path().join("mcpb-self-signed-key.pem").exists());

    mcpb_sign()
        .arg("verify")
        .arg(&bundle)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Signature is valid"))
        .stdout(predicate::str::contains("CLI Test Signer"))
        .stdout(predicate::str::contains("trust store"));

    mcpb_sign()
        .arg("info")
        .arg(&bundle)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Signed:      yes"))
        .stdout(predicate::str::contains("(valid)"));

    mcpb_sign()
        .arg("unsign")
        .arg(&bundle)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Removed signature"));

    assert_eq!(fs::read(&bundle).unwrap(), unsigned);
}

#[test]
fn verify_unsigned_exits_with_not_signed_code() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());

    mcpb_sign()
        .arg("verify")
        .arg(&bundle)
        .assert()
        .code(3)
        .stdout(predicate::str::contains("not signed"));
}

#[test]
fn verify_tampered_bundle_fails() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    sign_self_signed(temp.path(), &bundle);

    let mut bytes = fs::read(&bundle).unwrap();
    bytes[10] ^= 0x01;
    fs::write(&bundle, bytes).unwrap();

    mcpb_sign()
        .arg("verify")
        .arg(&bundle)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("signature verification failed"));

    mcpb_sign().arg("info").arg(&bundle).assert().code(1);
}

#[test]
fn sign_refuses_bundle_with_bytes_after_envelope() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    sign_self_signed(temp.path(), &bundle);

    let mut bytes = fs::read(&bundle).unwrap();
    bytes.push(b'\n');
    fs::write(&bundle, &bytes).unwrap();

    mcpb_sign()
        .current_dir(temp.path())
        .arg("sign")
        .arg(&bundle)
        .arg("--self-signed")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[malformed]:"))
        .stderr(predicate::str::contains("after its signature envelope"));

    assert_eq!(fs::read(&bundle).unwrap(), bytes);
}

#[test]
fn unsign_unsigned_bundle_warns_and_succeeds() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    let before = fs::read(&bundle).unwrap();

    mcpb_sign()
        .arg("unsign")
        .arg(&bundle)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("not signed"));

    assert_eq!(fs::read(&bundle).unwrap(), before);
}

#[test]
fn missing_bundle_is_reported() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.mcpb");

    for command in ["verify", "info", "unsign"] {
        mcpb_sign()
            .arg(command)
            .arg(&missing)
            .assert()
            .code(1)
            .stderr(predicate::str::starts_with("error[not-found]:"))
            .stderr(predicate::str::contains("bundle not found"));
    }
}

#[test]
fn sign_with_missing_credentials_fails() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    let before = fs::read(&bundle).unwrap();

    mcpb_sign()
        .current_dir(temp.path())
        .arg("sign")
        .arg(&bundle)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[not-found]:"))
        .stderr(predicate::str::contains("certificate not found"));

    assert_eq!(fs::read(&bundle).unwrap(), before);
}

#[test]
fn sign_with_explicit_credentials() {
    let temp = TempDir::new().unwrap();
    let bundle = packed(temp.path());
    let cert = temp.path().join("dev.crt");
    let key = temp.path().join("dev.key");

    // First run generates the pair at the given paths.
    mcpb_sign()
        .arg("sign")
        .arg(&bundle)
        .arg("--self-signed")
        .arg("--cert")
        .arg(&cert)
        .arg("--key")
        .arg(&key)
        .assert()
        .success();

    mcpb_sign()
        .arg("sign")
        .arg(&bundle)
        .arg("--cert")
        .arg(&cert)
        .arg("--key")
        .arg(&key)
        .assert()
        .success()
        .stdout(predicate::str::contains("replaced existing signature"));

    mcpb_sign().arg("verify").arg(&bundle).assert().code(0);
}

#[test]
fn pack_defaults_output_next_to_directory() {
    let temp = TempDir::new().unwrap();
    let src = source_dir(temp.path());

    mcpb_sign()
        .arg("pack")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("Packed 2 files"));

    assert!(temp.path().join("server.mcpb").exists());
}

#[test]
fn bad_arguments_are_usage_errors() {
    mcpb_sign().arg("verify").assert().code(2);
    mcpb_sign()
        .args(["sign", "x.mcpb", "--validity-days", "30"])
        .assert()
        .code(2);
}
