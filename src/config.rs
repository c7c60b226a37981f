use crate::error::{PaymentError, Result};
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_MIN_LATENCY_MS: u64 = 2_000;
pub const DEFAULT_MAX_LATENCY_MS: u64 = 5_000;
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Maximum number of jobs running at once.
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Shape of the simulated gateway: uniform latency in `[min_latency, max_latency]`
/// followed by a success draw with probability `success_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub success_rate: f64,
}

impl SettlementConfig {
    /// No latency; useful for tests and batch runs.
    pub fn instant(success_rate: f64) -> Self {
        Self {
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            success_rate,
        }
    }

    /// Latency bounds must be ordered and the rate a probability.
    pub fn validate(&self) -> Result<()> {
        if self.min_latency > self.max_latency {
            return Err(PaymentError::ValidationError(
                "Minimum latency must not exceed maximum latency".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(PaymentError::ValidationError(
                "Success rate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(DEFAULT_MIN_LATENCY_MS),
            max_latency: Duration::from_millis(DEFAULT_MAX_LATENCY_MS),
            success_rate: DEFAULT_SUCCESS_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub settlement: SettlementConfig,
    /// Payments left in `processing` longer than this are failed on startup.
    pub stale_after: Duration,
    /// Seeds the gateway's RNG for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            settlement: SettlementConfig::default(),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue.concurrency == 0 {
            return Err(PaymentError::ValidationError(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        self.settlement.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.settlement.success_rate, 0.9);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.queue.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.settlement.min_latency = Duration::from_secs(10);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.settlement.success_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.settlement.success_rate = f64::NAN;
        assert!(config.validate().is_err());
    }
}
