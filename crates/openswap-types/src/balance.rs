//! Quantity types and finalized ledger transfers.
//!
//! Assets are fungible integer tokens with no fractional units, so every
//! quantity and price is an unsigned integer.

use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetId};

/// A quantity of some asset, in its smallest indivisible unit.
pub type Amount = u128;

/// Units of target asset required per unit of base asset.
pub type Price = u128;

/// A finalized transfer on the asset ledger.
///
/// Returned by every successful ledger mutation and retained by the
/// exchange's unit of work so the transfer can be reversed exactly if a
/// later step of the same operation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ledger-wide sequence number of this transfer.
    pub seq: u64,
    /// The asset that moved.
    pub asset: AssetId,
    /// Debited account.
    pub from: AccountId,
    /// Credited account.
    pub to: AccountId,
    /// Quantity moved.
    pub amount: Amount,
    /// When the transfer consumed an allowance, the account it was granted to.
    pub spender: Option<AccountId>,
}

impl LedgerEntry {
    /// Whether this transfer drew on an allowance rather than being sent
    /// by the holder directly.
    #[must_use]
    pub fn consumed_allowance(&self) -> bool {
        self.spender.is_some()
    }
}
