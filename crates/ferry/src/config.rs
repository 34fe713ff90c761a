//! Layered CLI configuration: defaults, then `ferry.toml`, then `FERRY_*`
//! environment variables (`FERRY_TRANSFER__SETTLE_DELAY_MS=200`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use ferry_transfer::{HttpConfig, TransferConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG: &str = "ferry.toml";
pub const ENV_PREFIX: &str = "FERRY_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Used when `RUST_LOG` is not set.
    pub level:  String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level:  "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log:      LogConfig,
    pub transfer: TransferConfig,
    pub http:     HttpConfig,
}

impl AppConfig {
    /// Load the configuration. An explicitly given file must exist; the
    /// default `ferry.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            ensure!(path.is_file(), "config file {} not found", path.display());
        }
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG), Path::to_path_buf);
        Self::figment(&path)
            .extract()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, AppConfig::default());
            assert_eq!(config.transfer.settle_delay_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG,
                r#"
                [log]
                format = "json"

                [transfer]
                growth_factor = 1.25
                chunk_size = 4096

                [http]
                connect_timeout_secs = 5
                "#,
            )?;
            jail.set_env("FERRY_TRANSFER__CHUNK_SIZE", "1024");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.log.format, LogFormat::Json);
            assert_eq!(config.log.level, "info");
            assert_eq!(config.transfer.growth_factor, 1.25);
            assert_eq!(config.transfer.chunk_size, 1024);
            assert_eq!(config.transfer.warm_up_ms, 1_000);
            assert_eq!(config.http.connect_timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(AppConfig::load(Some(Path::new("absent.toml"))).is_err());
            Ok(())
        });
    }
}
