//! Persisted configuration defaults, per §6's option table and §12 of the
//! expanded design. Grounded on the teacher's `DdmConfig`/`load_or_init`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::UploadMethod;
use crate::retry::RetryConfig;

/// Durable defaults for batch calls that don't override them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub max_concurrent: usize,
    pub preferred_part_size: u64,
    pub min_part_size: u64,
    pub max_part_size: u64,
    pub timeout_secs: u64,
    pub retry_enabled: bool,
    pub retry_all_errors: bool,
    pub retry_max_duration_secs: u64,
    pub retry_max_count: Option<u32>,
    pub retry_initial_delay_ms: u64,
    pub retry_backoff: f64,
    pub mkdirs: bool,
    pub pool_capacity_bytes: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            max_concurrent: 8,
            preferred_part_size: 10 * 1024 * 1024,
            min_part_size: 1,
            max_part_size: u64::MAX,
            timeout_secs: 30,
            retry_enabled: true,
            retry_all_errors: false,
            retry_max_duration_secs: 60,
            retry_max_count: None,
            retry_initial_delay_ms: 100,
            retry_backoff: 2.0,
            mkdirs: false,
            pool_capacity_bytes: crate::pool::DEFAULT_POOL_CAPACITY,
        }
    }
}

impl TransferConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            enabled: self.retry_enabled,
            max_count: self.retry_max_count,
            max_duration: Duration::from_secs(self.retry_max_duration_secs),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            backoff: self.retry_backoff,
            retry_all_errors: self.retry_all_errors,
        }
    }
}

/// Per-call overrides layered on top of `TransferConfig`. `None` means "use
/// the persisted config's value". Mirrors the option table in §6.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub max_concurrent: Option<usize>,
    pub preferred_part_size: Option<u64>,
    pub min_part_size: Option<u64>,
    pub max_part_size: Option<u64>,
    pub headers: std::collections::HashMap<String, String>,
    pub multipart_headers: std::collections::HashMap<String, String>,
    pub method: UploadMethod,
    pub mkdirs: Option<bool>,
    pub retry: RetryOverrides,
}

#[derive(Debug, Clone, Default)]
pub struct RetryOverrides {
    pub enabled: Option<bool>,
    pub all_errors: Option<bool>,
    pub max_duration_secs: Option<u64>,
    pub max_count: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub backoff: Option<f64>,
}

impl Options {
    pub fn resolve(&self, base: &TransferConfig) -> TransferConfig {
        let mut cfg = base.clone();
        if let Some(v) = self.max_concurrent {
            cfg.max_concurrent = v;
        }
        if let Some(v) = self.preferred_part_size {
            cfg.preferred_part_size = v;
        }
        if let Some(v) = self.min_part_size {
            cfg.min_part_size = v;
        }
        if let Some(v) = self.max_part_size {
            cfg.max_part_size = v;
        }
        if let Some(v) = self.mkdirs {
            cfg.mkdirs = v;
        }
        if let Some(v) = self.retry.enabled {
            cfg.retry_enabled = v;
        }
        if let Some(v) = self.retry.all_errors {
            cfg.retry_all_errors = v;
        }
        if let Some(v) = self.retry.max_duration_secs {
            cfg.retry_max_duration_secs = v;
        }
        if let Some(v) = self.retry.max_count {
            cfg.retry_max_count = Some(v);
        }
        if let Some(v) = self.retry.initial_delay_ms {
            cfg.retry_initial_delay_ms = v;
        }
        if let Some(v) = self.retry.backoff {
            cfg.retry_backoff = v;
        }
        cfg
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("transfer")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Loads the persisted config, writing defaults on first run.
pub fn load_or_init() -> Result<TransferConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TransferConfig::default();
        let toml = toml::to_string_pretty(&default_cfg).context("failed to serialize default config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        fs::write(&path, toml).context("failed to write default config")?;
        tracing::info!(path = %path.display(), "created default transfer config");
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path).context("failed to read config file")?;
    let cfg: TransferConfig = toml::from_str(&data).context("failed to parse config file")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = TransferConfig::default();
        assert_eq!(cfg.max_concurrent, 8);
        assert_eq!(cfg.preferred_part_size, 10 * 1024 * 1024);
        assert!(cfg.retry_enabled);
        assert_eq!(cfg.retry_max_duration_secs, 60);
        assert_eq!(cfg.retry_initial_delay_ms, 100);
        assert_eq!(cfg.retry_backoff, 2.0);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TransferConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TransferConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent, cfg.max_concurrent);
        assert_eq!(parsed.retry_max_count, cfg.retry_max_count);
    }

    #[test]
    fn options_override_base_config() {
        let base = TransferConfig::default();
        let opts = Options {
            max_concurrent: Some(2),
            retry: RetryOverrides {
                max_count: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = opts.resolve(&base);
        assert_eq!(resolved.max_concurrent, 2);
        assert_eq!(resolved.retry_max_count, Some(3));
        assert_eq!(resolved.preferred_part_size, base.preferred_part_size);
    }
}
