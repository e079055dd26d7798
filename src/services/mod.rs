pub mod detector;
pub mod fetcher;
pub mod retry;
pub mod scanner;
pub mod storage;

pub use fetcher::PoolFetcher;
pub use retry::RetryPolicy;
pub use scanner::ScanEngine;
pub use storage::SnapshotStore;
