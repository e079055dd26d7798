use serde::{Deserialize, Serialize};
use crate::config::ExchangeConfig;

/// A single pool as last read from its exchange contract.
///
/// Reserves are kept as the exact decimal strings the contract returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub pool_id: u64,
    pub lp_token: String,
    pub reserve0: String,
    pub reserve1: String,
    pub symbol: String,
    pub token0: String,
    pub token1: String,
}

impl PoolRecord {
    pub const DEFAULT_SYMBOL: &'static str = "LP";
    pub const DEFAULT_RESERVE: &'static str = "0";

    /// Synthetic LP token id used when the contract does not report one.
    pub fn default_lp_token(exchange: &ExchangeConfig) -> String {
        format!("{}.{}", exchange.contract_address, exchange.contract_name)
    }
}

/// Returns true for non-empty strings made only of ASCII digits.
pub fn is_integer_amount(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSnapshot {
    pub name: String,
    pub contract_address: String,
    pub contract_name: String,
    pub pool_amount: u64,
    pub pools: Vec<PoolRecord>,
}

impl ExchangeSnapshot {
    pub fn new(exchange: &ExchangeConfig) -> Self {
        Self {
            name: exchange.name.clone(),
            contract_address: exchange.contract_address.clone(),
            contract_name: exchange.contract_name.clone(),
            pool_amount: 0,
            pools: Vec::new(),
        }
    }

    pub fn pool(&self, pool_id: u64) -> Option<&PoolRecord> {
        self.pools.iter().find(|p| p.pool_id == pool_id)
    }

    /// Replaces the pool with the same id in place, or appends it.
    pub fn upsert_pool(&mut self, record: PoolRecord) {
        match self.pools.iter_mut().find(|p| p.pool_id == record.pool_id) {
            Some(existing) => *existing = record,
            None => self.pools.push(record),
        }
    }

    /// Pools whose id is above the last observed pool count.
    pub fn stale_pools(&self) -> impl Iterator<Item = &PoolRecord> {
        let amount = self.pool_amount;
        self.pools.iter().filter(move |p| p.pool_id > amount)
    }
}

/// Every known exchange and its pools. Persisted as a plain JSON list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub exchanges: Vec<ExchangeSnapshot>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn exchange(&self, name: &str) -> Option<&ExchangeSnapshot> {
        self.exchanges.iter().find(|e| e.name == name)
    }

    /// Entry for `exchange`, created at the end of the list on first use.
    pub fn exchange_mut(&mut self, exchange: &ExchangeConfig) -> &mut ExchangeSnapshot {
        let index = match self.exchanges.iter().position(|e| e.name == exchange.name) {
            Some(index) => index,
            None => {
                self.exchanges.push(ExchangeSnapshot::new(exchange));
                self.exchanges.len() - 1
            }
        };
        &mut self.exchanges[index]
    }

    /// Merges a freshly fetched pool and records the latest pool count.
    pub fn merge_pool(&mut self, exchange: &ExchangeConfig, pool_amount: u64, record: PoolRecord) {
        let entry = self.exchange_mut(exchange);
        entry.pool_amount = pool_amount;
        entry.upsert_pool(record);
    }

    /// Records the latest pool count of an exchange that is already known.
    pub fn set_pool_amount(&mut self, name: &str, pool_amount: u64) {
        if let Some(entry) = self.exchanges.iter_mut().find(|e| e.name == name) {
            entry.pool_amount = pool_amount;
        }
    }

    pub fn pool_count(&self) -> usize {
        self.exchanges.iter().map(|e| e.pools.len()).sum()
    }
}
