//! System-wide constants for the OpenSwap exchange.

/// Default interval at which display clients re-read the offer (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of receipts retained in memory before the oldest are pruned.
pub const DEFAULT_RECEIPT_LOG_CAPACITY: usize = 10_000;

/// Whether the custody invariant is re-checked inside every operation by default.
pub const DEFAULT_VERIFY_CUSTODY: bool = true;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenSwap";
