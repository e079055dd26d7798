use std::time::Duration;

/// One remote read the scanner can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWork {
    PoolCount { exchange_index: usize },
    PoolDetails { exchange_index: usize, pool_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    /// `None` retries the same unit forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(cooldown: Duration) -> Self {
        Self { cooldown, max_attempts: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, cooldown: Duration },
    GiveUp { attempts: u32 },
}

/// Counts consecutive failures of the unit currently being worked on.
#[derive(Debug)]
pub struct RetryTracker {
    policy: RetryPolicy,
    current: Option<(UnitOfWork, u32)>,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, current: None }
    }

    pub fn record_failure(&mut self, unit: UnitOfWork) -> RetryDecision {
        let attempts = match self.current {
            Some((current, n)) if current == unit => n + 1,
            _ => 1,
        };

        if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
            self.current = None;
            return RetryDecision::GiveUp { attempts };
        }

        self.current = Some((unit, attempts));
        RetryDecision::Retry { attempt: attempts, cooldown: self.policy.cooldown }
    }

    pub fn record_success(&mut self, unit: UnitOfWork) {
        if matches!(self.current, Some((current, _)) if current == unit) {
            self.current = None;
        }
    }

    #[cfg(test)]
    pub fn failures(&self, unit: UnitOfWork) -> u32 {
        match self.current {
            Some((current, n)) if current == unit => n,
            _ => 0,
        }
    }
}
