use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use crate::config::ExchangeConfig;
use crate::models::pool::{is_integer_amount, PoolRecord};
use crate::sources::{PoolSource, SourceError};

/// Paced access to a `PoolSource`: a fixed delay before every details call
/// and a cooldown after a failed one.
pub struct PoolFetcher {
    source: Arc<dyn PoolSource>,
    fetch_delay: Duration,
    cooldown: Duration,
}

impl PoolFetcher {
    pub fn new(source: Arc<dyn PoolSource>, fetch_delay: Duration, cooldown: Duration) -> Self {
        Self { source, fetch_delay, cooldown }
    }

    /// Number of pools the exchange contract reports. Failures are logged
    /// and returned for the caller to retry; `Ok(0)` means nothing to scan.
    pub async fn fetch_pool_count(&self, exchange: &ExchangeConfig) -> Result<u64, SourceError> {
        match self.source.pool_count(exchange).await {
            Ok(count) => {
                tracing::debug!("{} reports {} pools", exchange.name, count);
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("{} error fetching pool count for {}: {}", self.source.name(), exchange.name, e);
                Err(e)
            }
        }
    }

    /// Details of one pool, or `None` after a failed call and its cooldown.
    /// `on_cooldown` runs right before the cooldown starts.
    pub async fn fetch_pool_details<F>(
        &self,
        exchange: &ExchangeConfig,
        pool_id: u64,
        on_cooldown: F,
    ) -> Option<PoolRecord>
    where
        F: FnOnce(Duration),
    {
        sleep(self.fetch_delay).await;

        let result = self.source.pool_details(exchange, pool_id).await.and_then(|record| {
            if record.pool_id != pool_id {
                return Err(SourceError::Parse(format!(
                    "asked for pool {pool_id}, got {}",
                    record.pool_id
                )));
            }
            if !is_integer_amount(&record.reserve0) || !is_integer_amount(&record.reserve1) {
                return Err(SourceError::Parse(format!(
                    "pool {pool_id} has non-integer reserves ({}, {})",
                    record.reserve0, record.reserve1
                )));
            }
            Ok(record)
        });

        match result {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    "{} error fetching pool {} of {}: {}",
                    self.source.name(),
                    pool_id,
                    exchange.name,
                    e
                );
                on_cooldown(self.cooldown);
                sleep(self.cooldown).await;
                None
            }
        }
    }
}
