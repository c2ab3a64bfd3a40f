//! The consumed interface of an external asset ledger.

use openswap_types::{AccountId, Amount, AssetId, LedgerEntry, Result};

/// External fungible-asset ledger interface.
///
/// Each implementation bridges the exchange to a concrete ledger (an
/// in-process token table, a chain client, a custodian API). Every
/// successful mutation is final on return and reported as a
/// [`LedgerEntry`]; a rejected mutation changes nothing.
pub trait AssetLedger {
    /// Balance of `account` in `asset`. Unknown assets and accounts read as 0.
    fn balance_of(&self, asset: &AssetId, account: AccountId) -> Amount;

    /// How much of `owner`'s `asset` the `spender` may still move.
    fn allowance(&self, asset: &AssetId, owner: AccountId, spender: AccountId) -> Amount;

    /// Move `amount` from `from` to `to`, sent by `from` itself.
    ///
    /// # Errors
    /// `UnknownAsset`, or `InsufficientBalance` if `from` holds too little.
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry>;

    /// Move `amount` from `from` to `to` on the strength of an allowance
    /// `from` granted to `spender`. The allowance is reduced by `amount`.
    ///
    /// # Errors
    /// `UnknownAsset`, `InsufficientAuthorization` if the allowance is too
    /// small, or `InsufficientBalance` if `from` holds too little.
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry>;

    /// Undo a previously returned entry: balances and any consumed
    /// allowance are restored exactly.
    ///
    /// # Errors
    /// `RollbackFailed` if the credited account no longer holds the amount.
    fn reverse(&mut self, entry: &LedgerEntry) -> Result<()>;
}
