//! Detector and receive-timeout settings.

use std::time::Duration;

use crate::error::DeadlockError;

/// Configuration for the [`DeadlockDetector`](crate::DeadlockDetector) and
/// the receive timeout handlers it hands out.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// How long a receive waits before it first reports itself as
    /// waiting. Default: 10 s.
    pub receive_timeout: Duration,
    /// Multiplier applied to the timeout after each consecutive expiry of
    /// the same receive. Default: 1.5.
    pub backoff_factor: f64,
    /// Upper bound on the escalated timeout. Default: 5 min.
    pub max_receive_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(10),
            backoff_factor: 1.5,
            max_receive_timeout: Duration::from_secs(300),
        }
    }
}

impl DetectorConfig {
    /// Check all invariants.
    pub fn validate(&self) -> Result<(), DeadlockError> {
        if self.receive_timeout.is_zero() {
            return Err(DeadlockError::InvalidConfig {
                reason: "receive_timeout must be positive".to_string(),
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(DeadlockError::InvalidConfig {
                reason: format!("backoff_factor must be finite and >= 1, got {}", self.backoff_factor),
            });
        }
        if self.max_receive_timeout < self.receive_timeout {
            return Err(DeadlockError::InvalidConfig {
                reason: "max_receive_timeout is below receive_timeout".to_string(),
            });
        }
        Ok(())
    }

    /// The timeout after `consecutive` expiries: `receive_timeout ×
    /// backoff_factor^consecutive`, capped at `max_receive_timeout`.
    pub fn timeout_after(&self, consecutive: u32) -> Duration {
        let scale = self.backoff_factor.powi(consecutive.min(i32::MAX as u32) as i32);
        let secs = self.receive_timeout.as_secs_f64() * scale;
        if !secs.is_finite() || secs >= self.max_receive_timeout.as_secs_f64() {
            self.max_receive_timeout
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let zero = DetectorConfig {
            receive_timeout: Duration::ZERO,
            ..DetectorConfig::default()
        };
        assert!(zero.validate().is_err());

        let shrinking = DetectorConfig {
            backoff_factor: 0.5,
            ..DetectorConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let nan = DetectorConfig {
            backoff_factor: f64::NAN,
            ..DetectorConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn timeout_grows_by_half_each_expiry() {
        let config = DetectorConfig {
            receive_timeout: Duration::from_secs(2),
            ..DetectorConfig::default()
        };
        assert_eq!(config.timeout_after(0), Duration::from_secs(2));
        assert_eq!(config.timeout_after(1), Duration::from_secs(3));
        assert_eq!(config.timeout_after(2), Duration::from_secs_f64(4.5));
        assert_eq!(config.timeout_after(100), Duration::from_secs(300));
    }
}
