use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const API_KEY: &str = "1234567890ABCDEF1234567890ABCDEF";

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("bugsnag-cli").unwrap();
    cmd.env_remove("BUGSNAG_API_KEY")
        .env_remove("ANDROID_NDK_ROOT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_dex(path: &Path, fill: u8) {
    let mut bytes = b"dex\n035\0".to_vec();
    bytes.extend_from_slice(&[0xAA; 4]);
    bytes.extend_from_slice(&[fill; 20]);
    bytes.extend_from_slice(&[0u8; 80]);
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_create_android_build_id_prints_hex() {
    let dir = tempfile::tempdir().unwrap();
    write_dex(&dir.path().join("classes.dex"), 0x0F);
    write_dex(&dir.path().join("classes2.dex"), 0xF0);

    cli()
        .arg("create-android-build-id")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ff".repeat(20)));
}

#[test]
fn test_unknown_kind_is_a_usage_error() {
    cli()
        .args(["upload", "not-a-kind"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_api_key_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("mapping.txt");
    fs::write(&mapping, "com.example.Foo -> a:\n").unwrap();

    cli()
        .args(["upload", "android-proguard", "--version-code", "1"])
        .arg(&mapping)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--api-key"))
        .stdout(predicate::str::contains("BUGSNAG_API_KEY"));
}

#[test]
fn test_api_key_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("mapping.txt");
    fs::write(&mapping, "com.example.Foo -> a:\n").unwrap();

    cli()
        .env("BUGSNAG_API_KEY", API_KEY)
        .args(["--dry-run", "upload", "android-proguard", "--version-code", "1"])
        .arg(&mapping)
        .assert()
        .success();
}

#[test]
fn test_dry_run_logs_target_without_sending() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("mapping.txt");
    fs::write(&mapping, "com.example.Foo -> a:\n").unwrap();

    cli()
        .args([
            "upload",
            "android-proguard",
            "--api-key",
            API_KEY,
            "--application-id",
            "com.example",
            "--version-code",
            "7",
            "--upload-api-root-url",
            "http://127.0.0.1:9",
            "--dry-run",
            "--verbose",
        ])
        .arg(&mapping)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "(dryrun) Skipping upload of mapping.txt to http://127.0.0.1:9/android-proguard",
        ))
        .stdout(predicate::str::contains("appId: com.example"))
        .stdout(predicate::str::contains("Dry run complete"));
}

#[test]
fn test_create_build_requires_version() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["create-build", "--api-key", API_KEY, "--dry-run"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--version-name"));
}

#[test]
fn test_create_build_dry_run_prints_payload() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "create-build",
            "--api-key",
            API_KEY,
            "--version-name",
            "1.2.0",
            "--release-stage",
            "beta",
            "--dry-run",
        ])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"appVersion\": \"1.2.0\""))
        .stdout(predicate::str::contains("\"releaseStage\": \"beta\""));
}

#[test]
fn test_unsupported_provider_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "create-build",
            "--api-key",
            API_KEY,
            "--version-name",
            "1.0",
            "--provider",
            "svn",
            "--dry-run",
        ])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("unsupported source control provider 'svn'"));
}

#[test]
fn test_zero_timeout_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["upload", "--timeout", "0", "breakpad"])
        .arg(dir.path().join("x.sym"))
        .assert()
        .code(2);
}
