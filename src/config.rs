use crate::error::{Result, StreamError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;

/// Polling and retry policy for one logical stream.
///
/// The defaults reproduce the production schedule: poll every second,
/// back off to 2s after a minute without data, 5s after five minutes,
/// 10s after fifteen, and abandon the stream entirely after 1800 empty
/// polls (about 30 minutes of wall time). All of these are policy
/// knobs, not protocol constants, so they are configurable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Transport retries per failure class before giving up.
    pub max_retries: u32,

    /// Consecutive empty polls tolerated before the stream is abandoned.
    pub max_no_data_ticks: u32,

    /// Tick counts at which the poll interval steps up.
    pub tick_thresholds: TickThresholds,

    /// Poll intervals for each backoff tier.
    pub poll_intervals: PollIntervals,

    /// Delay before re-polling after a cut chunked body.
    pub incomplete_body_retry_delay_ms: u64,

    /// Delay before re-polling after other mid-stream failures.
    pub failure_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickThresholds {
    pub one_minute: u32,
    pub five_minutes: u32,
    pub fifteen_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    pub default_ms: u64,
    pub after_1_min_ms: u64,
    pub after_5_min_ms: u64,
    pub after_15_min_ms: u64,
}

impl Default for TickThresholds {
    fn default() -> Self {
        Self {
            one_minute: 60,
            five_minutes: 300,
            fifteen_minutes: 900,
        }
    }
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            default_ms: 1000,
            after_1_min_ms: 2000,
            after_5_min_ms: 5000,
            after_15_min_ms: 10000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            max_no_data_ticks: 1800,
            tick_thresholds: TickThresholds::default(),
            poll_intervals: PollIntervals::default(),
            incomplete_body_retry_delay_ms: 3000,
            failure_retry_delay_ms: 5000,
        }
    }
}

impl StreamConfig {
    /// Load configuration from environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.max_retries = env_u32("STREAM_MAX_RETRIES", config.max_retries)?;
        config.max_no_data_ticks = env_u32("STREAM_MAX_NO_DATA_TICKS", config.max_no_data_ticks)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with environment variables
    /// taking precedence over file values.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| StreamError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: StreamConfig = toml::from_str(&contents)
            .map_err(|e| StreamError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.max_retries = env_u32("STREAM_MAX_RETRIES", config.max_retries)?;
        config.max_no_data_ticks = env_u32("STREAM_MAX_NO_DATA_TICKS", config.max_no_data_ticks)?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_no_data_ticks == 0 {
            return Err(StreamError::ConfigError(
                "max_no_data_ticks must be greater than 0".to_string(),
            ));
        }

        let t = &self.tick_thresholds;
        if !(t.one_minute < t.five_minutes && t.five_minutes < t.fifteen_minutes) {
            return Err(StreamError::ConfigError(
                "Tick thresholds must be strictly increasing".to_string(),
            ));
        }

        let p = &self.poll_intervals;
        if !(p.default_ms <= p.after_1_min_ms
            && p.after_1_min_ms <= p.after_5_min_ms
            && p.after_5_min_ms <= p.after_15_min_ms)
        {
            return Err(StreamError::ConfigError(
                "Poll intervals must be non-decreasing across tiers".to_string(),
            ));
        }

        if p.default_ms == 0 {
            return Err(StreamError::ConfigError(
                "Default poll interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The delay before the next poll, given how many consecutive
    /// polls have returned no data.
    pub fn poll_interval(&self, no_data_ticks: u32) -> Duration {
        let ms = if no_data_ticks > self.tick_thresholds.fifteen_minutes {
            self.poll_intervals.after_15_min_ms
        } else if no_data_ticks > self.tick_thresholds.five_minutes {
            self.poll_intervals.after_5_min_ms
        } else if no_data_ticks > self.tick_thresholds.one_minute {
            self.poll_intervals.after_1_min_ms
        } else {
            self.poll_intervals.default_ms
        };
        Duration::from_millis(ms)
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u32>()
            .map_err(|e| StreamError::ConfigError(format!("Invalid {} value: {}", key, e))),
        Err(_) => Ok(default),
    }
}
