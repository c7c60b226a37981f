use crate::config::SettlementConfig;
use crate::domain::payment::Payment;
use crate::domain::ports::{SettlementGateway, SettlementOutcome};
use crate::error::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Gateway stand-in: waits a random while, then settles or declines.
///
/// Each call draws independently, so outcomes are uncorrelated across payments.
/// The wait is a tokio sleep and never holds the RNG lock.
pub struct SimulatedGateway {
    config: SettlementConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedGateway {
    /// Fails with `PaymentError::ValidationError` if `config` has unordered
    /// latency bounds or a success rate outside `[0, 1]`.
    pub fn new(config: SettlementConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: SettlementConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SettlementConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: Mutex::new(rng),
        })
    }

    fn draw(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let latency = rng.gen_range(self.config.min_latency..=self.config.max_latency);
        let success = rng.gen_bool(self.config.success_rate);
        (latency, success)
    }
}

#[async_trait]
impl SettlementGateway for SimulatedGateway {
    async fn settle(&self, payment: &Payment) -> Result<SettlementOutcome> {
        let (latency, success) = self.draw();
        debug!(
            payment_id = payment.id,
            latency_ms = latency.as_millis() as u64,
            "Simulating settlement"
        );

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        Ok(if success {
            SettlementOutcome::Settled
        } else {
            SettlementOutcome::Declined
        })
    }
}
