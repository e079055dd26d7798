use crate::models::{ExchangeSnapshot, PoolRecord, Snapshot};
use std::collections::HashMap;
use std::fmt;

/// An additive difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    NewExchange {
        exchange: String,
    },
    NewPool {
        exchange: String,
        pool_id: u64,
    },
    ReservesUpdated {
        exchange: String,
        pool_id: u64,
        reserve0: (String, String),
        reserve1: (String, String),
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::NewExchange { exchange } => write!(f, "New DEX added: {}", exchange),
            Change::NewPool { exchange, pool_id } => {
                write!(f, "{}: New pool added - ID: {}", exchange, pool_id)
            }
            Change::ReservesUpdated { exchange, pool_id, reserve0, reserve1 } => write!(
                f,
                "{} Pool {}: Reserves updated ({}->{}, {}->{})",
                exchange, pool_id, reserve0.0, reserve0.1, reserve1.0, reserve1.1
            ),
        }
    }
}

/// Lists what `new` adds or updates relative to `old`.
///
/// Exchanges are matched by name and pools by id. Reserves compare as exact
/// strings. Anything present only in `old` is ignored. Output follows the
/// order of `new`.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<Change> {
    let old_by_name: HashMap<&str, &ExchangeSnapshot> = old.exchanges.iter()
        .map(|e| (e.name.as_str(), e))
        .collect();

    let mut changes = Vec::new();

    for new_dex in &new.exchanges {
        // Every pool of an exchange seen for the first time is new as well.
        let old_pools: HashMap<u64, &PoolRecord> = match old_by_name.get(new_dex.name.as_str()) {
            Some(old_dex) => old_dex.pools.iter().map(|p| (p.pool_id, p)).collect(),
            None => {
                changes.push(Change::NewExchange { exchange: new_dex.name.clone() });
                HashMap::new()
            }
        };

        for new_pool in &new_dex.pools {
            match old_pools.get(&new_pool.pool_id) {
                None => changes.push(Change::NewPool {
                    exchange: new_dex.name.clone(),
                    pool_id: new_pool.pool_id,
                }),
                Some(old_pool) => {
                    if old_pool.reserve0 != new_pool.reserve0 || old_pool.reserve1 != new_pool.reserve1 {
                        changes.push(Change::ReservesUpdated {
                            exchange: new_dex.name.clone(),
                            pool_id: new_pool.pool_id,
                            reserve0: (old_pool.reserve0.clone(), new_pool.reserve0.clone()),
                            reserve1: (old_pool.reserve1.clone(), new_pool.reserve1.clone()),
                        });
                    }
                }
            }
        }
    }

    changes
}
