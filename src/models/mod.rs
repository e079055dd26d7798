pub mod pool;

pub use pool::{ExchangeSnapshot, PoolRecord, Snapshot};
