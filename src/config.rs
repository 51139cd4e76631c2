//! Configuration Module
//!
//! Handles loading the demo program's settings from environment variables.

use std::env;
use std::time::Duration;

/// Demo configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between background sweeps
    pub sweep_interval: Duration,
    /// Delay between two rounds of printing the demo keys
    pub poll_interval: Duration,
    /// Number of print rounds before the demo exits
    pub poll_rounds: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 5000)
    /// - `POLL_INTERVAL_MS` - Print frequency in milliseconds (default: 2000)
    /// - `POLL_ROUNDS` - Number of print rounds (default: 6)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_millis("SWEEP_INTERVAL_MS").unwrap_or(defaults.sweep_interval),
            poll_interval: env_millis("POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            poll_rounds: env::var("POLL_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.poll_rounds),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            poll_rounds: 6,
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_rounds, 6);
    }

    #[test]
    fn test_config_from_env() {
        env::remove_var("SWEEP_INTERVAL_MS");
        env::set_var("POLL_INTERVAL_MS", "250");
        env::set_var("POLL_ROUNDS", "not a number");

        let config = Config::from_env();
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.poll_rounds, 6);

        env::remove_var("POLL_INTERVAL_MS");
        env::remove_var("POLL_ROUNDS");
    }
}
