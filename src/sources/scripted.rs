//! In-memory `PoolSource` with scripted failures, for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use crate::config::ExchangeConfig;
use crate::models::PoolRecord;
use super::{PoolSource, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Count(String),
    Details(String, u64),
}

#[derive(Default)]
pub struct ScriptedSource {
    pools: Mutex<HashMap<String, Vec<PoolRecord>>>,
    count_failures: Mutex<HashMap<String, u32>>,
    detail_failures: Mutex<HashMap<(String, u64), u32>>,
    detail_panics: Mutex<HashSet<(String, u64)>>,
    calls: Mutex<Vec<Call>>,
}

pub fn exchange(name: &str) -> ExchangeConfig {
    ExchangeConfig {
        name: name.to_string(),
        contract_address: "SP2ZNGJ85ENDY6QRHQ5P2D4FXKGZWCKTB2T0Z55KS".to_string(),
        contract_name: format!("{}-core", name.to_lowercase()),
    }
}

pub fn pool(id: u64, reserve0: &str, reserve1: &str) -> PoolRecord {
    PoolRecord {
        pool_id: id,
        lp_token: format!("SP1.lp-{id}"),
        reserve0: reserve0.to_string(),
        reserve1: reserve1.to_string(),
        symbol: "LP".to_string(),
        token0: "SP1.x".to_string(),
        token1: "SP1.y".to_string(),
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(self, exchange: &str, pools: Vec<PoolRecord>) -> Self {
        self.pools.lock().insert(exchange.to_string(), pools);
        self
    }

    /// The next `times` count calls for `exchange` fail.
    pub fn fail_count(self, exchange: &str, times: u32) -> Self {
        self.count_failures.lock().insert(exchange.to_string(), times);
        self
    }

    /// The next `times` detail calls for `pool_id` fail.
    pub fn fail_details(self, exchange: &str, pool_id: u64, times: u32) -> Self {
        self.detail_failures
            .lock()
            .insert((exchange.to_string(), pool_id), times);
        self
    }

    /// The next detail call for `pool_id` panics.
    pub fn panic_details(self, exchange: &str, pool_id: u64) -> Self {
        self.detail_panics.lock().insert((exchange.to_string(), pool_id));
        self
    }

    pub fn set_pool(&self, exchange: &str, record: PoolRecord) {
        let mut pools = self.pools.lock();
        let entry = pools.entry(exchange.to_string()).or_default();
        match entry.iter_mut().find(|p| p.pool_id == record.pool_id) {
            Some(existing) => *existing = record,
            None => entry.push(record),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn take_failure<K: std::hash::Hash + Eq>(map: &Mutex<HashMap<K, u32>>, key: &K) -> bool {
        let mut map = map.lock();
        match map.get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PoolSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn pool_count(&self, exchange: &ExchangeConfig) -> Result<u64, SourceError> {
        self.calls.lock().push(Call::Count(exchange.name.clone()));
        if Self::take_failure(&self.count_failures, &exchange.name) {
            return Err(SourceError::Network("scripted count failure".to_string()));
        }
        Ok(self.pools.lock().get(&exchange.name).map_or(0, |p| p.len() as u64))
    }

    async fn pool_details(
        &self,
        exchange: &ExchangeConfig,
        pool_id: u64,
    ) -> Result<PoolRecord, SourceError> {
        self.calls.lock().push(Call::Details(exchange.name.clone(), pool_id));
        let key = (exchange.name.clone(), pool_id);
        if self.detail_panics.lock().remove(&key) {
            panic!("scripted panic on pool {pool_id}");
        }
        if Self::take_failure(&self.detail_failures, &key) {
            return Err(SourceError::RateLimit);
        }
        self.pools
            .lock()
            .get(&exchange.name)
            .and_then(|pools| pools.iter().find(|p| p.pool_id == pool_id).cloned())
            .ok_or_else(|| SourceError::Rejected(format!("no pool {pool_id}")))
    }
}
