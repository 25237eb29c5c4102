//! Config load validation tests for coinload-config.
// crates/coinload-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, syntax).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

#![allow(
    clippy::use_debug,
    clippy::float_cmp,
    reason = "Test-only diagnostics compare exact default values."
)]

mod common;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use coinload_config::CoinloadConfig;
use coinload_config::DEFAULT_BASE_URL;
use tempfile::NamedTempFile;

use crate::common::TestResult;
use crate::common::assert_invalid;
use crate::common::write_config;

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(CoinloadConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(CoinloadConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_reports_missing_file_as_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(CoinloadConfig::load(Some(&path)), "config io error")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(CoinloadConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(CoinloadConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let file = write_config("[load\nrate_per_second = 1")?;
    assert_invalid(CoinloadConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn load_rejects_unknown_keys() -> TestResult {
    let file = write_config("[load]\nrate = 10.0\n")?;
    assert_invalid(CoinloadConfig::load(Some(file.path())), "config parse error")?;
    let file = write_config("[metrics]\nenabled = true\n")?;
    assert_invalid(CoinloadConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn empty_file_yields_default_run() -> TestResult {
    let file = write_config("")?;
    let config = CoinloadConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let settings = config.harness_settings().map_err(|err| err.to_string())?;
    if settings.base_url.as_str() != DEFAULT_BASE_URL {
        return Err(format!("unexpected base url {}", settings.base_url));
    }
    let expected = (1_000, 1000.0, Duration::from_secs(300), 200, 1_000, Duration::from_secs(1));
    let actual = (
        settings.users.size,
        settings.load.rate_per_second,
        settings.load.duration,
        settings.load.pre_allocated_workers,
        settings.load.max_workers,
        settings.scenario.inter_step_delay,
    );
    if actual != expected {
        return Err(format!("unexpected defaults {actual:?}"));
    }
    if settings.users.username_prefix != "stress_test_user_" || settings.scenario.item != "socks" {
        return Err("unexpected user or scenario defaults".to_string());
    }
    if settings.session_ttl.is_some() || !config.logging.enabled {
        return Err("unexpected ttl or logging defaults".to_string());
    }
    Ok(())
}

#[test]
fn full_file_maps_onto_harness_settings() -> TestResult {
    let file = write_config(
        r#"
[target]
base_url = "https://shop.example.test/api"

[users]
pool_size = 25
username_prefix = "load_user_"
password = "hunter2hunter2"

[load]
rate_per_second = 12.5
duration_seconds = 30
pre_allocated_workers = 4
max_workers = 8

[scenario]
inter_step_delay_ms = 250
item = "t-shirt"
transfer_amount = 3
request_timeout_ms = 1500
max_response_bytes = 4096
session_ttl_seconds = 60

[thresholds]
max_check_failure_ratio = 0.2

[logging]
enabled = false
path = "events.jsonl"
"#,
    )?;
    let config = CoinloadConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let settings = config.harness_settings().map_err(|err| err.to_string())?;
    if settings.base_url.as_str() != "https://shop.example.test/api" {
        return Err(format!("unexpected base url {}", settings.base_url));
    }
    if settings.users.size != 25 || settings.users.username_prefix != "load_user_" {
        return Err("unexpected users section".to_string());
    }
    if settings.load.max_workers != 8 || settings.load.duration != Duration::from_secs(30) {
        return Err("unexpected load section".to_string());
    }
    if settings.scenario.transfer_amount != 3
        || settings.scenario.request_timeout != Duration::from_millis(1_500)
        || settings.scenario.inter_step_delay != Duration::from_millis(250)
    {
        return Err("unexpected scenario section".to_string());
    }
    if settings.session_ttl != Some(Duration::from_secs(60)) {
        return Err("unexpected session ttl".to_string());
    }
    if config.executor_config().max_response_bytes != 4_096 {
        return Err("unexpected executor limit".to_string());
    }
    if config.logging.enabled || config.logging.path.is_none() {
        return Err("unexpected logging section".to_string());
    }
    Ok(())
}

#[test]
fn load_unvalidated_defers_range_checks() -> TestResult {
    let file = write_config("[load]\nrate_per_second = 0.0\n")?;
    let mut config = CoinloadConfig::load_unvalidated(Some(file.path())).map_err(|err| err.to_string())?;
    assert_invalid(config.validate().map(|()| config.clone()), "load.rate_per_second")?;
    config.load.rate_per_second = 5.0;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn repository_example_config_is_valid() -> TestResult {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../coinload.toml");
    CoinloadConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    Ok(())
}
