use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::job::JobSettings;
use crate::retry::RetryPolicy;

/// Attempt budgets (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts to issue one range request, including the first.
    pub request_attempts: u32,
    /// Pause between request attempts, in seconds.
    pub request_delay_secs: f64,
    /// Attempts to read one response body, including the first.
    pub read_attempts: u32,
    pub read_delay_secs: f64,
    /// Times a failed block is requeued before it counts as failed.
    pub block_retries: u32,
    pub probe_attempts: u32,
    pub probe_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            request_attempts: 5,
            request_delay_secs: 3.0,
            read_attempts: 10,
            read_delay_secs: 2.0,
            block_retries: 2,
            probe_attempts: 5,
            probe_delay_secs: 1.0,
        }
    }
}

/// Global configuration loaded from `~/.config/blockdl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockdlConfig {
    /// Block size in KiB.
    pub block_size_kb: u64,
    /// Concurrent download workers per job.
    pub workers: usize,
    /// Zero-fill chunk size in MiB used when creating a destination file.
    #[serde(default = "default_prefill_chunk_mib")]
    pub prefill_chunk_mib: usize,
    /// Progress sampling period in milliseconds.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Number of samples in the speed window.
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,
    /// Optional retry budgets; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_prefill_chunk_mib() -> usize {
    20
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_sample_window() -> usize {
    5
}

impl Default for BlockdlConfig {
    fn default() -> Self {
        Self {
            block_size_kb: 500,
            workers: 8,
            prefill_chunk_mib: default_prefill_chunk_mib(),
            sample_interval_ms: default_sample_interval_ms(),
            sample_window: default_sample_window(),
            retry: None,
        }
    }
}

impl BlockdlConfig {
    pub fn block_size_bytes(&self) -> u64 {
        self.block_size_kb.saturating_mul(1024)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size_kb == 0 {
            anyhow::bail!("block_size_kb must be greater than zero");
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be greater than zero");
        }
        if self.prefill_chunk_mib == 0 {
            anyhow::bail!("prefill_chunk_mib must be greater than zero");
        }
        if self.sample_window < 2 {
            anyhow::bail!("sample_window must be at least 2");
        }
        if let Some(retry) = &self.retry {
            if retry.request_attempts == 0 || retry.read_attempts == 0 || retry.probe_attempts == 0 {
                anyhow::bail!("retry attempt counts must be greater than zero");
            }
            for (name, secs) in [
                ("request_delay_secs", retry.request_delay_secs),
                ("read_delay_secs", retry.read_delay_secs),
                ("probe_delay_secs", retry.probe_delay_secs),
            ] {
                if Duration::try_from_secs_f64(secs).is_err() {
                    anyhow::bail!("{} must be a non-negative number of seconds, got {}", name, secs);
                }
            }
        }
        Ok(())
    }

    /// Engine settings for these values. Call `validate` first.
    pub fn job_settings(&self) -> JobSettings {
        let retry = self.retry.clone().unwrap_or_default();
        JobSettings {
            request_policy: RetryPolicy::new(
                retry.request_attempts,
                Duration::from_secs_f64(retry.request_delay_secs),
            ),
            read_policy: RetryPolicy::new(
                retry.read_attempts,
                Duration::from_secs_f64(retry.read_delay_secs),
            ),
            probe_policy: RetryPolicy::new(
                retry.probe_attempts,
                Duration::from_secs_f64(retry.probe_delay_secs),
            ),
            block_retries: retry.block_retries,
            prefill_chunk: self.prefill_chunk_mib.saturating_mul(1024 * 1024),
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            sample_window: self.sample_window,
            ..JobSettings::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("blockdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BlockdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BlockdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BlockdlConfig = toml::from_str(&data)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BlockdlConfig::default();
        assert_eq!(cfg.block_size_kb, 500);
        assert_eq!(cfg.block_size_bytes(), 512_000);
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.prefill_chunk_mib, 20);
        assert!(cfg.retry.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn default_settings_match_engine_defaults() {
        assert_eq!(BlockdlConfig::default().job_settings(), JobSettings::default());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = BlockdlConfig {
            retry: Some(RetryConfig::default()),
            ..BlockdlConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BlockdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_minimal() {
        let toml = r#"
            block_size_kb = 1024
            workers = 4
        "#;
        let cfg: BlockdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.block_size_kb, 1024);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.sample_interval_ms, 1000);
        assert_eq!(cfg.sample_window, 5);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            block_size_kb = 64
            workers = 2

            [retry]
            request_attempts = 3
            request_delay_secs = 0.5
            read_attempts = 4
            read_delay_secs = 0.25
            block_retries = 1
            probe_attempts = 2
            probe_delay_secs = 0.0
        "#;
        let cfg: BlockdlConfig = toml::from_str(toml).unwrap();
        cfg.validate().unwrap();
        let settings = cfg.job_settings();
        assert_eq!(settings.request_policy, RetryPolicy::new(3, Duration::from_millis(500)));
        assert_eq!(settings.read_policy, RetryPolicy::new(4, Duration::from_millis(250)));
        assert_eq!(settings.probe_policy, RetryPolicy::new(2, Duration::ZERO));
        assert_eq!(settings.block_retries, 1);
    }

    #[test]
    fn validate_rejects_zeroes() {
        let cfg = BlockdlConfig {
            block_size_kb: 0,
            ..BlockdlConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BlockdlConfig {
            workers: 0,
            ..BlockdlConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BlockdlConfig {
            retry: Some(RetryConfig {
                read_attempts: 0,
                ..RetryConfig::default()
            }),
            ..BlockdlConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BlockdlConfig {
            retry: Some(RetryConfig {
                read_delay_secs: -1.0,
                ..RetryConfig::default()
            }),
            ..BlockdlConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unrepresentable_delays() {
        for secs in [1e20, f64::INFINITY, f64::NAN] {
            let cfg = BlockdlConfig {
                retry: Some(RetryConfig {
                    request_delay_secs: secs,
                    ..RetryConfig::default()
                }),
                ..BlockdlConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("request_delay_secs"), "{}", err);
        }
        let cfg = BlockdlConfig {
            retry: Some(RetryConfig {
                probe_delay_secs: 86_400.0,
                ..RetryConfig::default()
            }),
            ..BlockdlConfig::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.job_settings().probe_policy.delay, Duration::from_secs(86_400));
    }
}
