//! Configuration for an OpenSwap exchange instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AccountId, Result, SwapError, constants};

/// Configuration for a single exchange instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// The party that deployed the exchange.
    pub owner: AccountId,
    /// Ledger account that holds escrowed assets on the exchange's behalf.
    pub custody_account: AccountId,
    /// How often display clients should re-read the offer.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Re-check escrowed custody against offer bookkeeping before every commit.
    #[serde(default = "default_verify_custody")]
    pub verify_custody: bool,
    /// Receipts retained in memory.
    #[serde(default = "default_receipt_log_capacity")]
    pub receipt_log_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    constants::DEFAULT_POLL_INTERVAL_MS
}

fn default_verify_custody() -> bool {
    constants::DEFAULT_VERIFY_CUSTODY
}

fn default_receipt_log_capacity() -> usize {
    constants::DEFAULT_RECEIPT_LOG_CAPACITY
}

impl ExchangeConfig {
    /// Config with defaults for everything but the two accounts.
    #[must_use]
    pub fn new(owner: AccountId, custody_account: AccountId) -> Self {
        Self {
            owner,
            custody_account,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            verify_custody: constants::DEFAULT_VERIFY_CUSTODY,
            receipt_log_capacity: constants::DEFAULT_RECEIPT_LOG_CAPACITY,
        }
    }

    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    /// `Serialization` on malformed JSON, `Configuration` on bad values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Configuration` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(SwapError::Configuration(
                "poll_interval_ms must be > 0".into(),
            ));
        }
        if self.receipt_log_capacity == 0 {
            return Err(SwapError::Configuration(
                "receipt_log_capacity must be > 0".into(),
            ));
        }
        if self.owner == self.custody_account {
            return Err(SwapError::Configuration(
                "custody_account must differ from owner".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
