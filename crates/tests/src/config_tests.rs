//! Configuration loading from TOML files and `GATEWAY__*` environment overrides.
//!
//! Tests touching process environment run under `#[serial]`.

use gateway_core::{config::AppConfig, runtime::GatewayRuntime};
use serial_test::serial;
use std::{io::Write, path::PathBuf};
use tempfile::{NamedTempFile, TempDir};

const GATEWAY_TOML: &str = r#"
environment = "staging"

[server]
bind_address = "0.0.0.0"
bind_port = 9100
max_body_bytes = 2048

[logging]
level = "debug"
format = "json"

[pocket]
full_node_host = "https://full-node.example.com"
request_timeout_ms = 4000

[session]
primer_interval_ms = 2500
session_ttl_seconds = 120

[qos]
default_height_tolerance = 50

[[chains]]
chain_id = "0021"
altruist_url = "https://eth-archive.example.com"
altruist_request_timeout = "3s"

[[chains]]
chain_id = "0006"
height_check_block_tolerance = 200

[[applications]]
id = "app-1"
public_key = "pk1"
address = "addr1"
chains = ["0021", "0006"]
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

fn clear_env() {
    for key in ["GATEWAY_CONFIG", "GATEWAY__SERVER__BIND_PORT", "GATEWAY__POCKET__FULL_NODE_HOST"] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_file_reads_every_section() {
    clear_env();
    let file = write_config(GATEWAY_TOML);

    let config = AppConfig::from_file(file.path()).unwrap();

    assert_eq!(config.environment, "staging");
    assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9100");
    assert_eq!(config.server.max_body_bytes, 2048);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.pocket.request_timeout_ms, 4000);
    assert_eq!(config.session.primer_interval_ms, 2500);
    assert_eq!(config.session.session_ttl_seconds, 120);
    assert_eq!(config.session.blocks_per_session, 4);
    assert_eq!(config.qos.default_height_tolerance, 50);
    assert_eq!(config.chains.len(), 2);
    assert_eq!(config.chains[0].altruist_url(), Some("https://eth-archive.example.com"));
    assert_eq!(config.chains[1].height_check_block_tolerance, Some(200));
    assert_eq!(config.applications[0].chains, vec!["0021", "0006"]);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_environment_overrides_file_values() {
    clear_env();
    let file = write_config(GATEWAY_TOML);
    std::env::set_var("GATEWAY__SERVER__BIND_PORT", "9200");
    std::env::set_var("GATEWAY__POCKET__FULL_NODE_HOST", "https://override.example.com");

    let config = AppConfig::from_file(file.path());
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.server.bind_port, 9200);
    assert_eq!(config.pocket.full_node_host, "https://override.example.com");
    assert_eq!(config.server.bind_address, "0.0.0.0");
}

#[test]
#[serial]
fn test_load_honours_config_path_variable() {
    clear_env();
    let file = write_config(GATEWAY_TOML);
    std::env::set_var("GATEWAY_CONFIG", file.path());

    let config = AppConfig::load();
    clear_env();

    assert_eq!(config.unwrap().server.bind_port, 9100);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing: PathBuf = dir.path().join("gateway.toml");

    let config = AppConfig::from_file(&missing).unwrap();

    assert_eq!(config.server.bind_port, 8080);
    assert_eq!(config.logging.level, "info");
    assert!(config.metrics.enabled);
    assert!(config.chains.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    clear_env();
    let file = write_config("[server\nbind_port = ");

    assert!(AppConfig::from_file(file.path()).is_err());
}

#[test]
#[serial]
fn test_invalid_file_values_are_rejected_by_validation() {
    clear_env();
    let cases = [
        ("[logging]\nformat = \"xml\"\n", "Logging format"),
        ("[session]\nprimer_interval_ms = 0\n", "primer and sweep"),
        ("[qos]\njob_interval_ms = 0\n", "scheduler and job"),
        ("[[chains]]\nchain_id = \"0021\"\n[[chains]]\nchain_id = \"0021\"\n", "Duplicate chain"),
        ("[[chains]]\nchain_id = \"0021\"\naltruist_url = \"::nope\"\n", "Invalid altruist URL"),
        (
            "[[applications]]\nid = \"a\"\npublic_key = \"\"\naddress = \"x\"\n",
            "Empty public key",
        ),
        ("[[qos.classification]]\ncontains = \" \"\nbucket = \"kickable\"\n", "non-empty"),
    ];

    for (contents, expected) in cases {
        let file = write_config(contents);
        let config = AppConfig::from_file(file.path()).unwrap();
        let error = config.validate().unwrap_err();
        assert!(error.contains(expected), "{contents:?} gave {error:?}");
    }
}

#[test]
#[serial]
fn test_runtime_builds_from_loaded_file() {
    clear_env();
    let file = write_config(GATEWAY_TOML);
    let config = AppConfig::from_file(file.path()).unwrap();

    let runtime = GatewayRuntime::builder()
        .with_config(config)
        .disable_background_tasks()
        .build()
        .expect("runtime from file config");

    assert_eq!(runtime.config().chains.len(), 2);
    assert_eq!(runtime.background_task_count(), 0);
}
