use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::record::Direction;

/// Admission and streaming knobs.
///
/// # Examples
///
/// ```
/// use ferry_transfer::TransferConfig;
/// use std::time::Duration;
///
/// let config = TransferConfig::default()
///     .warm_up(Duration::from_millis(2_000))
///     .growth_factor(1.25);
/// assert_eq!(config.warm_up_ms, 2_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Active time after which a transfer's throughput feeds admission.
    ///
    /// Default: 1000 ms
    pub warm_up_ms: u64,

    /// Pause before re-sampling aggregate speed after a transfer ends while
    /// others are still running.
    ///
    /// Default: 500 ms
    pub settle_delay_ms: u64,

    /// Aggregate speed must exceed the previous sample times this factor for
    /// another transfer to be admitted.
    ///
    /// Default: 1.4
    pub growth_factor: f64,

    /// Speed window length, in ticks, for downloads.
    ///
    /// Default: 10
    pub download_window: usize,

    /// Speed window length, in ticks, for uploads. Uploads sample on every
    /// chunk handed to the transport, hence the longer window.
    ///
    /// Default: 150
    pub upload_window: usize,

    /// Largest write to disk (downloads) or read from disk (uploads).
    ///
    /// Default: 8 KiB
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            warm_up_ms:      1_000,
            settle_delay_ms: 500,
            growth_factor:   1.4,
            download_window: 10,
            upload_window:   150,
            chunk_size:      8 * 1024,
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up_ms = warm_up.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = factor;
        self
    }

    #[must_use]
    pub fn download_window(mut self, ticks: usize) -> Self {
        self.download_window = ticks;
        self
    }

    #[must_use]
    pub fn upload_window(mut self, ticks: usize) -> Self {
        self.upload_window = ticks;
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn settle_delay_duration(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn window_for(&self, direction: Direction) -> usize {
        match direction {
            Direction::Download => self.download_window.max(1),
            Direction::Upload => self.upload_window.max(1),
        }
    }

    /// Chunk size clamped to at least one byte.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Settings for the bundled reqwest client.
///
/// Only the connect phase is bounded; reads and whole calls are left to run
/// as long as the transfer does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Default: 30 s
    pub connect_timeout_secs: u64,
    pub user_agent:           String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            user_agent:           concat!("ferry/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.warm_up_ms, 1_000);
        assert_eq!(config.settle_delay_duration(), Duration::from_millis(500));
        assert_eq!(config.growth_factor, 1.4);
        assert_eq!(config.window_for(Direction::Download), 10);
        assert_eq!(config.window_for(Direction::Upload), 150);
        assert_eq!(config.chunk_size, 8192);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: TransferConfig =
            serde_json::from_str(r#"{ "settle_delay_ms": 50, "upload_window": 0 }"#).unwrap();
        assert_eq!(config.settle_delay_ms, 50);
        assert_eq!(config.warm_up_ms, 1_000);
        assert_eq!(config.window_for(Direction::Upload), 1);
    }

    #[test]
    fn test_builders() {
        let config = TransferConfig::default()
            .settle_delay(Duration::ZERO)
            .chunk_size(0)
            .download_window(4);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.effective_chunk_size(), 1);
        assert_eq!(config.window_for(Direction::Download), 4);
    }

    #[test]
    fn test_http_config() {
        let config: HttpConfig = serde_json::from_str(r#"{ "connect_timeout_secs": 5 }"#).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert!(config.user_agent.starts_with("ferry/"));
    }
}
