//! Unit tests for configuration resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SONGLAB_ROOT_FOLDER are marked with #[serial].

use serde::Deserialize;
use serial_test::serial;
use songlab_common::config::{ensure_directory_exists, load_toml, resolve_root_folder};
use std::env;
use std::path::{Path, PathBuf};

const TEST_ENV: &str = "SONGLAB_TEST_ROOT_FOLDER";

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(TEST_ENV, "/tmp/songlab-from-env");

    let resolved = resolve_root_folder(Some(Path::new("/tmp/songlab-from-cli")), TEST_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/songlab-from-cli"));

    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(TEST_ENV, "/tmp/songlab-from-env");

    let resolved = resolve_root_folder(None, TEST_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/songlab-from-env"));

    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_blank_env_var_falls_through() {
    env::set_var(TEST_ENV, "   ");

    let resolved = resolve_root_folder(None, TEST_ENV);
    assert_ne!(resolved, PathBuf::from("   "));
    assert!(!resolved.as_os_str().is_empty());

    env::remove_var(TEST_ENV);
}

#[test]
fn test_ensure_directory_creates_nested_path() {
    let temp = tempfile::tempdir().unwrap();
    let nested = temp.path().join("a").join("b");

    ensure_directory_exists(&nested).unwrap();
    assert!(nested.is_dir());

    // Second call is a no-op
    ensure_directory_exists(&nested).unwrap();
}

#[test]
fn test_ensure_directory_rejects_file() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("not-a-dir");
    std::fs::write(&file, b"x").unwrap();

    assert!(ensure_directory_exists(&file).is_err());
}

#[derive(Debug, Deserialize)]
struct Sample {
    port: u16,
    #[serde(default)]
    name: Option<String>,
}

#[test]
fn test_load_toml_missing_file_is_none() {
    let temp = tempfile::tempdir().unwrap();
    let loaded: Option<Sample> = load_toml(&temp.path().join("absent.toml")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_load_toml_parses_and_reports_errors() {
    let temp = tempfile::tempdir().unwrap();
    let good = temp.path().join("good.toml");
    std::fs::write(&good, "port = 6000\nname = \"lab\"\n").unwrap();

    let loaded: Sample = load_toml(&good).unwrap().expect("file exists");
    assert_eq!(loaded.port, 6000);
    assert_eq!(loaded.name.as_deref(), Some("lab"));

    let bad = temp.path().join("bad.toml");
    std::fs::write(&bad, "port = \"not a number\"\n").unwrap();
    assert!(load_toml::<Sample>(&bad).is_err());
}
