//! Subsystem configuration (§10.3): the defaults this engine owns, loaded
//! from `~/.sftpcp/config.toml`. Grounded on the donor's
//! `Config::init`/`dirs::home_dir` storage-dir convention, re-targeted at
//! `TransferOptions` defaults instead of host-alias storage. Host aliases,
//! SSH client paths, and other dispatcher-level config stay out of scope.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::TransferOptions;

fn default_buffer_size() -> usize {
    256 * 1024
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_recursive() -> bool {
    true
}

fn default_show_progress() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_max_depth() -> i64 {
    -1
}

/// `TransferOptions` defaults plus the knobs only this subsystem owns:
/// copy-loop buffer size and listing-cache freshness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recursive: default_recursive(),
            show_progress: default_show_progress(),
            concurrency: default_concurrency(),
            max_depth: default_max_depth(),
            buffer_size: default_buffer_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Config {
    /// Directory holding `config.toml` and logs: `~/.sftpcp`.
    pub fn storage_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sftpcp"))
    }

    fn config_path(storage_dir: &Path) -> PathBuf {
        storage_dir.join("config.toml")
    }

    /// Loads `~/.sftpcp/config.toml` if present, falling back to defaults
    /// when the directory or file is missing. A present-but-unparsable file
    /// is reported rather than silently ignored.
    pub fn load() -> anyhow::Result<Self> {
        let Some(dir) = Self::storage_dir() else {
            return Ok(Config::default());
        };
        let path = Self::config_path(&dir);
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Writes the current config to `~/.sftpcp/config.toml`, creating the
    /// storage directory if needed.
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::storage_dir().ok_or_else(|| anyhow::anyhow!("no home directory"))?;
        std::fs::create_dir_all(&dir)?;
        let path = Self::config_path(&dir);
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(&path, raw)?;
        Ok(())
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            recursive: self.recursive,
            show_progress: self.show_progress,
            concurrency: self.concurrency,
            max_depth: self.max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_transfer_options_defaults() {
        let config = Config::default();
        let opts = config.transfer_options();
        assert_eq!(opts, TransferOptions::default());
    }

    #[test]
    fn partial_toml_fills_in_remaining_defaults() {
        let config: Config = toml::from_str("concurrency = 8\n").unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_depth, -1);
        assert!(config.recursive);
    }
}
