// src/config.rs

//! Configuration loading utilities.
//!
//! The file at `<storage-dir>/config.toml` is optional; missing or broken
//! files fall back to defaults. Environment variables are applied on top.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Application key for a larger API quota.
pub const ENV_API_KEY: &str = "STACKFLOW_API_KEY";
/// Page ceiling per (window, strategy).
pub const ENV_MAX_PAGES: &str = "STACKFLOW_MAX_PAGES";
/// Delay after every page request.
pub const ENV_POLITENESS_DELAY_MS: &str = "STACKFLOW_POLITENESS_DELAY_MS";
/// Tag every fetched question must carry.
pub const ENV_TAGGED: &str = "STACKFLOW_TAGGED";

/// Load configuration from a TOML file.
///
/// Falls back to defaults if loading fails.
pub fn load_config(path: &Path) -> Config {
    Config::load_or_default(path)
}

/// Override config values from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

/// Override config values from any variable lookup.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
        config.api.key = Some(key);
    }

    if let Some(pages) = lookup(ENV_MAX_PAGES) {
        match pages.parse() {
            Ok(n) => config.collector.max_pages = n,
            Err(_) => log::warn!("Ignoring {}={:?}: not a number", ENV_MAX_PAGES, pages),
        }
    }

    if let Some(delay) = lookup(ENV_POLITENESS_DELAY_MS) {
        match delay.parse() {
            Ok(ms) => config.collector.politeness_delay_ms = ms,
            Err(_) => log::warn!(
                "Ignoring {}={:?}: not a number",
                ENV_POLITENESS_DELAY_MS,
                delay
            ),
        }
    }

    if let Some(tagged) = lookup(ENV_TAGGED).filter(|t| !t.trim().is_empty()) {
        config.api.tagged = tagged;
    }
}

/// Load, override and validate the configuration of a storage directory.
pub fn load_all(storage_dir: &Path) -> Result<Config> {
    let mut config = load_config(&storage_dir.join("config.toml"));
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}
