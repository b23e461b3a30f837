//! Replay configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for one Completion Gate wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    pub timeout_ms: u64,
    pub poll_ms: u64,
}

impl WaitOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            timeout_ms: 200_000,
            poll_ms: 100,
        }
    }
}

/// Configuration shared by every buffer of a [`ReplayHub`](crate::ReplayHub).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Hard capacity of a step buffer. Older records are evicted first.
    pub max_steps: usize,

    /// Coalescing interval between the first staged push and its flush.
    pub flush_interval_ms: u64,

    /// Longest total playback the gate tolerates before speeding up.
    pub target_ceiling_ms: u64,

    /// Per-step delay of a new cursor.
    pub default_speed_ms: u64,

    /// Whether the gate may shorten a cursor's per-step delay.
    pub speed_adjustable: bool,

    /// Whether a new cursor starts playing without being asked.
    pub autoplay: bool,

    /// Default bounds for gate waits.
    pub wait: WaitOptions,
}

impl ReplayConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn target_ceiling(&self) -> Duration {
        Duration::from_millis(self.target_ceiling_ms)
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            max_steps: 5000,
            flush_interval_ms: 50,
            target_ceiling_ms: 180_000,
            default_speed_ms: 250,
            speed_adjustable: true,
            autoplay: true,
            wait: WaitOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.max_steps, 5000);
        assert_eq!(config.flush_interval(), Duration::from_millis(50));
        assert_eq!(config.target_ceiling(), Duration::from_secs(180));
        assert_eq!(config.default_speed_ms, 250);
        assert!(config.wait.timeout() > config.target_ceiling());
    }

    #[test]
    fn zero_poll_is_clamped() {
        let opts = WaitOptions { timeout_ms: 10, poll_ms: 0 };
        assert_eq!(opts.poll(), Duration::from_millis(1));
    }
}
