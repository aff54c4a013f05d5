//! Runtime configuration for the `sqlitely` CLI.
//!
//! Layered with `figment`: built-in defaults, then an optional
//! `sqlitely.toml` in the current directory, then environment variables
//! prefixed `SQLITELY_`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Knobs that belong to configuration rather than engine behavior:
/// named collaborators out of scope for the engine crates but still
/// needed by something -- here, the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Indent string the SQL generator uses for multi-line output; empty
    /// disables line folding entirely.
    pub indent: String,
    /// Below this file size (bytes), the grid model counts rows with
    /// `COUNT(*)` instead of estimating from `MAX(rowid)`.
    pub page_size_threshold_bytes: u64,
    /// Default cap on search worker results.
    pub search_result_cap: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { indent: "    ".to_string(), page_size_threshold_bytes: 32 * 1024 * 1024, search_result_cap: 1000 }
    }
}

impl RuntimeConfig {
    /// Loads defaults, then merges `sqlitely.toml` (if present in the
    /// current directory) and `SQLITELY_*` environment variables over
    /// them, in that order.
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file("sqlitely.toml"))
            .merge(Env::prefixed("SQLITELY_"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `std::env::set_var` is process-global; serialize the two tests in
    // this module so they don't race on `SQLITELY_SEARCH_RESULT_CAP`.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_load_without_a_config_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg = RuntimeConfig::load().unwrap();
        assert_eq!(cfg.indent, "    ");
        assert_eq!(cfg.search_result_cap, 1000);
    }

    #[test]
    fn env_override_takes_effect() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SQLITELY_SEARCH_RESULT_CAP", "42");
        let cfg = RuntimeConfig::load().unwrap();
        std::env::remove_var("SQLITELY_SEARCH_RESULT_CAP");
        assert_eq!(cfg.search_result_cap, 42);
    }
}
