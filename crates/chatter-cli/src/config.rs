//! CLI configuration loaded from environment variables.
//!
//! Every setting has a default, so `chatter` starts with no configuration
//! at all.

use std::path::PathBuf;

use chatter_core::CoreConfig;
use chatter_shared::constants::MAX_MESSAGE_BYTES;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "chatter_cli=info,chatter_core=info,chatter_store=warn,warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// SQLite file holding the documents.
    /// Env: `CHATTER_DB_PATH`
    /// Default: `chatter.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives the process.
    /// Env: `CHATTER_IN_MEMORY` (true/false)
    /// Default: `false`
    pub in_memory: bool,

    /// Longest accepted message, in bytes.
    /// Env: `CHATTER_MAX_MESSAGE_BYTES`
    /// Default: 16 KiB
    pub max_message_bytes: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory: false,
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

impl CliConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = var("CHATTER_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("CHATTER_IN_MEMORY") {
            config.in_memory = val == "true" || val == "1";
        }

        if let Some(val) = var("CHATTER_MAX_MESSAGE_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_message_bytes = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid CHATTER_MAX_MESSAGE_BYTES, using default"
                ),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            max_message_bytes: self.max_message_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> CliConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.core_config(), CoreConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CHATTER_DB_PATH", "/tmp/chat.db"),
            ("CHATTER_IN_MEMORY", "1"),
            ("CHATTER_MAX_MESSAGE_BYTES", "512"),
        ]);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/chat.db")));
        assert!(config.in_memory);
        assert_eq!(config.core_config().max_message_bytes, 512);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("CHATTER_IN_MEMORY", "yes please"),
            ("CHATTER_MAX_MESSAGE_BYTES", "lots"),
        ]);
        assert!(!config.in_memory);
        assert_eq!(config.max_message_bytes, MAX_MESSAGE_BYTES);
        assert_eq!(load(&[("CHATTER_MAX_MESSAGE_BYTES", "0")]).max_message_bytes, MAX_MESSAGE_BYTES);
    }
}
