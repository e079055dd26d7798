//! Sequential pool scanner.
//!
//! Walks every configured exchange and every pool id `1..=count` in order,
//! merging each fetched pool into a working snapshot and handing the whole
//! snapshot to the store, which writes only when something changed. A failed
//! read is retried on the same unit of work. The scan never finishes: after
//! the last exchange it starts over at the first one.

use parking_lot::RwLock;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use crate::config::ExchangeConfig;
use crate::models::Snapshot;
use super::fetcher::PoolFetcher;
use super::retry::{RetryDecision, RetryPolicy, RetryTracker, UnitOfWork};
use super::storage::{SnapshotStore, StoreError};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no exchanges configured")]
    NoExchanges,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning { exchange_index: usize, pool_id: u64 },
    AwaitingRetry { unit: UnitOfWork, cooldown: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub exchange_index: usize,
    pub pool_id: u64,
}

impl Cursor {
    pub const START: Cursor = Cursor { exchange_index: 0, pool_id: 1 };
}

/// What a single `step` did.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Counted { exchange_index: usize, count: u64 },
    Fetched { exchange_index: usize, pool_id: u64, changes: usize },
    Retrying { unit: UnitOfWork, attempt: u32 },
    Skipped { unit: UnitOfWork },
    ExchangeDone { next: usize },
    CycleComplete,
}

/// Process-local scan progress. Never persisted.
pub struct ScanState {
    pub cursor: Cursor,
    pool_count: Option<u64>,
    working: Snapshot,
    retries: RetryTracker,
}

pub struct ScanEngine {
    fetcher: PoolFetcher,
    store: Arc<SnapshotStore>,
    exchanges: Vec<ExchangeConfig>,
    retry_policy: RetryPolicy,
    restart_cooldown: Duration,
    running: AtomicBool,
    phase: RwLock<ScanPhase>,
}

impl ScanEngine {
    pub fn new(
        fetcher: PoolFetcher,
        store: Arc<SnapshotStore>,
        exchanges: Vec<ExchangeConfig>,
        retry_policy: RetryPolicy,
        restart_cooldown: Duration,
    ) -> Result<Self, ScanError> {
        if exchanges.is_empty() {
            return Err(ScanError::NoExchanges);
        }

        Ok(Self {
            fetcher,
            store,
            exchanges,
            retry_policy,
            restart_cooldown,
            running: AtomicBool::new(false),
            phase: RwLock::new(ScanPhase::Idle),
        })
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the scan loop. Returns `None` if one is already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Scan already running, start ignored");
            return None;
        }

        tracing::info!("🔄 Starting update process over {} exchanges", self.exchanges.len());
        let engine = Arc::clone(self);
        Some(tokio::spawn(engine.run()))
    }

    /// Runs scans forever. A scan that fails or panics is restarted from the
    /// first exchange after the restart cooldown; the running guard stays held.
    async fn run(self: Arc<Self>) {
        loop {
            let engine = Arc::clone(&self);
            match tokio::spawn(async move { engine.scan().await }).await {
                Ok(Ok(never)) => match never {},
                Ok(Err(e)) => tracing::error!("Scan failed: {}", e),
                Err(e) => tracing::error!("Scan task aborted: {}", e),
            }

            self.set_phase(ScanPhase::Idle);
            tracing::info!("Restarting scan in {:?}", self.restart_cooldown);
            sleep(self.restart_cooldown).await;
        }
    }

    /// One uninterrupted scan from the start cursor. Returns only on failure.
    pub async fn scan(&self) -> Result<Infallible, ScanError> {
        let mut state = self.initial_state();
        loop {
            self.step(&mut state).await?;
        }
    }

    /// Fresh cursor over the currently persisted snapshot.
    pub fn initial_state(&self) -> ScanState {
        let working = self.store.load();
        if working.is_empty() {
            tracing::info!("No cached pools, scanning from scratch");
        } else {
            tracing::info!(
                "Resuming over {} cached pools from {}",
                working.pool_count(),
                self.store.path().display()
            );
        }

        ScanState {
            cursor: Cursor::START,
            pool_count: None,
            working,
            retries: RetryTracker::new(self.retry_policy),
        }
    }

    /// Performs one remote read, or moves the cursor past a finished exchange.
    pub async fn step(&self, state: &mut ScanState) -> Result<Step, ScanError> {
        let exchange_index = state.cursor.exchange_index;
        let exchange = &self.exchanges[exchange_index];

        let Some(count) = state.pool_count else {
            return Ok(self.count_pools(state, exchange_index).await);
        };

        let pool_id = state.cursor.pool_id;
        if pool_id > count {
            return Ok(self.advance_exchange(state));
        }

        self.set_phase(ScanPhase::Scanning { exchange_index, pool_id });
        let unit = UnitOfWork::PoolDetails { exchange_index, pool_id };

        let awaiting = |cooldown| self.set_phase(ScanPhase::AwaitingRetry { unit, cooldown });
        match self.fetcher.fetch_pool_details(exchange, pool_id, awaiting).await {
            Some(record) => {
                state.retries.record_success(unit);
                state.working.merge_pool(exchange, count, record);
                let changes = self.store.save(&state.working)?;
                state.cursor.pool_id += 1;
                Ok(Step::Fetched { exchange_index, pool_id, changes: changes.len() })
            }
            // The fetcher has already waited out its cooldown.
            None => match state.retries.record_failure(unit) {
                RetryDecision::Retry { attempt, .. } => {
                    tracing::warn!(
                        "Retrying pool {} for {} (attempt {})",
                        pool_id,
                        exchange.name,
                        attempt + 1
                    );
                    Ok(Step::Retrying { unit, attempt })
                }
                RetryDecision::GiveUp { attempts } => {
                    tracing::warn!(
                        "Skipping pool {} for {} after {} attempts",
                        pool_id,
                        exchange.name,
                        attempts
                    );
                    state.cursor.pool_id += 1;
                    Ok(Step::Skipped { unit })
                }
            },
        }
    }

    async fn count_pools(&self, state: &mut ScanState, exchange_index: usize) -> Step {
        let exchange = &self.exchanges[exchange_index];
        let unit = UnitOfWork::PoolCount { exchange_index };

        match self.fetcher.fetch_pool_count(exchange).await {
            Ok(count) => {
                state.retries.record_success(unit);
                state.pool_count = Some(count);
                state.working.set_pool_amount(&exchange.name, count);
                if count == 0 {
                    tracing::debug!("{} has no pools to scan this round", exchange.name);
                }
                self.warn_stale(state, exchange, count);
                Step::Counted { exchange_index, count }
            }
            Err(_) => match state.retries.record_failure(unit) {
                RetryDecision::Retry { attempt, cooldown } => {
                    self.set_phase(ScanPhase::AwaitingRetry { unit, cooldown });
                    tracing::warn!(
                        "Error fetching pool count for {}, retrying in {:?}...",
                        exchange.name,
                        cooldown
                    );
                    sleep(cooldown).await;
                    Step::Retrying { unit, attempt }
                }
                RetryDecision::GiveUp { attempts } => {
                    tracing::warn!(
                        "Skipping {} this round after {} failed pool count attempts",
                        exchange.name,
                        attempts
                    );
                    self.advance_exchange(state);
                    Step::Skipped { unit }
                }
            },
        }
    }

    fn warn_stale(&self, state: &ScanState, exchange: &ExchangeConfig, count: u64) {
        if let Some(entry) = state.working.exchange(&exchange.name) {
            let stale = entry.pools.iter().filter(|p| p.pool_id > count).count();
            if stale > 0 {
                tracing::warn!(
                    "{} now reports {} pools, keeping {} cached pools above that id",
                    exchange.name,
                    count,
                    stale
                );
            }
        }
    }

    fn advance_exchange(&self, state: &mut ScanState) -> Step {
        let next = (state.cursor.exchange_index + 1) % self.exchanges.len();
        state.cursor = Cursor { exchange_index: next, pool_id: 1 };
        state.pool_count = None;

        if next == 0 {
            let stats = self.store.stats();
            let stale: usize = state.working.exchanges.iter()
                .map(|e| e.stale_pools().count())
                .sum();
            tracing::info!(
                "✓ Cycle complete: {} exchanges, {} pools ({} stale) | {} writes",
                state.working.exchanges.len(),
                state.working.pool_count(),
                stale,
                stats.writes
            );
            Step::CycleComplete
        } else {
            Step::ExchangeDone { next }
        }
    }

    fn set_phase(&self, phase: ScanPhase) {
        *self.phase.write() = phase;
    }
}
