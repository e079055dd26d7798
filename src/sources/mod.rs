pub mod clarity;
pub mod hiro;
pub mod normalize;

#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;
use crate::config::ExchangeConfig;
use crate::models::PoolRecord;
use clarity::ClarityError;

/// Read-only access to an exchange contract's pools.
#[async_trait]
pub trait PoolSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn pool_count(&self, exchange: &ExchangeConfig) -> Result<u64, SourceError>;
    async fn pool_details(
        &self,
        exchange: &ExchangeConfig,
        pool_id: u64,
    ) -> Result<PoolRecord, SourceError>;
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited")]
    RateLimit,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("call rejected: {0}")]
    Rejected(String),

    #[error("decode error: {0}")]
    Decode(#[from] ClarityError),

    #[error("parse error: {0}")]
    Parse(String),
}
