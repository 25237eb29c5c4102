// crates/coinload-config/src/lib.rs
// ============================================================================
// Module: Coinload Config Library
// Description: Canonical config model and validation for coinload.toml.
// Purpose: Single source of truth for run configuration semantics.
// Dependencies: coinload-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `coinload-config` parses `coinload.toml`, applies strict fail-closed
//! validation, and converts the result into the settings consumed by
//! `coinload-core`. Every field has a default, so an empty file describes the
//! standard run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
