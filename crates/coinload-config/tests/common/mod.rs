// crates/coinload-config/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for coinload-config tests.
// Purpose: Write temporary config files and assert on validation errors.
// Dependencies: coinload-config, tempfile
// ============================================================================

//! ## Overview
//! Helpers for writing TOML into temporary files and matching error text.

use std::io::Write;

use coinload_config::CoinloadConfig;
use coinload_config::ConfigError;
use tempfile::NamedTempFile;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid(result: Result<CoinloadConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// Writes `contents` to a temporary file that lives as long as the handle.
pub fn write_config(contents: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(contents.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}
