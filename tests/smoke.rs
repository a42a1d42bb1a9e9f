//! Smoke tests -- verify both binaries run and fail the way they should.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_server_help() {
    Command::cargo_bin("test-server")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Serve a file over libp2p"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--file"));
}

#[test]
fn test_client_help() {
    Command::cargo_bin("test-client")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--streams"));
}

#[test]
fn test_client_requires_peer() {
    Command::cargo_bin("test-client")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_server_missing_file_fails_fast() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing.bin");

    Command::cargo_bin("test-server")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .args(["--port", "0", "--listen-ip", "127.0.0.1", "--file"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot serve"))
        .stdout(predicate::str::contains("I am").not());
}

#[test]
fn test_client_rejects_address_without_peer_id() {
    Command::cargo_bin("test-client")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .arg("/ip4/127.0.0.1/tcp/4001")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not end in /p2p/<peer-id>"));
}

#[test]
fn test_client_rejects_garbage_address() {
    Command::cargo_bin("test-client")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .arg("not-an-address")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid multiaddress"));
}

#[test]
fn test_client_rejects_zero_streams() {
    Command::cargo_bin("test-client")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .args(["--streams", "0", "/ip4/127.0.0.1/tcp/4001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stream count must be at least 1"));
}

#[test]
fn test_server_accepts_single_dash_long_flags() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing.bin");

    Command::cargo_bin("test-server")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .args(["-port", "0", "-listen-ip", "127.0.0.1", "-file"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot serve"))
        .stderr(predicate::str::contains("invalid value").not());
}

#[test]
fn test_client_accepts_single_dash_long_flags() {
    Command::cargo_bin("test-client")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .args(["-streams", "0", "/ip4/127.0.0.1/tcp/4001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stream count must be at least 1"));
}

#[test]
fn test_client_rejects_huge_buffer_size() {
    Command::cargo_bin("test-client")
        .unwrap()
        .env_remove("P2PBENCH_CONFIG")
        .args(["--buffer-size", "18446744073709551615", "/ip4/127.0.0.1/tcp/4001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds the maximum"));
}
