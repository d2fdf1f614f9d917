//! Session and reconnection configuration

use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Shape of a tracked workout session.
///
/// The defaults mirror the TapFit workout screen: four sets of ten reps
/// with a 90 second rest between sets.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Number of sets in a session
    pub total_sets: u8,
    /// Rep target per set
    pub target_reps: u8,
    /// Rest countdown between sets, in seconds
    pub rest_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_sets: 4,
            target_reps: 10,
            rest_seconds: 90,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of sets per session
    pub fn with_total_sets(mut self, sets: u8) -> Self {
        self.total_sets = sets;
        self
    }

    /// Set the rep target per set
    pub fn with_target_reps(mut self, reps: u8) -> Self {
        self.target_reps = reps;
        self
    }

    /// Set the rest duration between sets
    pub fn with_rest_seconds(mut self, seconds: u32) -> Self {
        self.rest_seconds = seconds;
        self
    }
}

/// Bounded exponential backoff schedule for reconnect attempts.
///
/// With the defaults the supervisor retries five times, sleeping
/// 500ms, 1s, 2s, 4s and 8s before each attempt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReconnectConfig {
    /// Maximum reconnect attempts before the session is abandoned
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles on every failure
    pub initial_delay: Duration,
    /// Upper bound on the per-attempt delay
    pub max_delay: Duration,
    /// Scan/connect timeout applied to each attempt
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of reconnect attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the initial backoff delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Backoff delay before the given 1-based attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_shape() {
        let config = SessionConfig::default();
        assert_eq!(config.total_sets, 4);
        assert_eq!(config.target_reps, 10);
        assert_eq!(config.rest_seconds, 90);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(8));
        // Capped past the configured maximum
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let config = ReconnectConfig::default().with_max_delay(Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }
}
