//! Escrow adapter: moves assets into and out of exchange custody.
//!
//! The adapter acts for a single custody account. `pull_in` draws on an
//! allowance the holder granted to that account; `push_out` pays from it.
//! Both either finalize a single ledger entry or change nothing.

use openswap_types::{AccountId, Amount, AssetId, LedgerEntry, Result, SwapError};

use crate::asset_ledger::AssetLedger;

/// Custody operations against an [`AssetLedger`] on behalf of one exchange.
pub struct EscrowAdapter<L> {
    ledger: L,
    /// The account escrowed assets are held in.
    custody: AccountId,
}

impl<L: AssetLedger> EscrowAdapter<L> {
    /// Wrap `ledger`, holding custody in `custody`.
    #[must_use]
    pub fn new(ledger: L, custody: AccountId) -> Self {
        Self { ledger, custody }
    }

    /// Debit `amount` of `asset` from `from` into custody.
    ///
    /// `from` must already have authorized the custody account for at
    /// least `amount`; the ledger enforces that, not this adapter.
    ///
    /// # Errors
    /// `InsufficientAuthorization` or `InsufficientBalance` from the ledger
    /// (or `UnknownAsset`). Custody is unchanged on failure.
    pub fn pull_in(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        match self
            .ledger
            .transfer_from(asset, self.custody, from, self.custody, amount)
        {
            Ok(entry) => {
                tracing::debug!(
                    %asset,
                    from = %from.short(),
                    amount,
                    seq = entry.seq,
                    "Pulled into custody"
                );
                Ok(entry)
            }
            Err(err) => {
                tracing::warn!(
                    %asset,
                    from = %from.short(),
                    amount,
                    error = %err,
                    "Pull-in rejected"
                );
                Err(err)
            }
        }
    }

    /// Credit `amount` of `asset` from custody to `to`.
    ///
    /// # Errors
    /// `InsufficientCustody` if custody holds less than `amount`. That can
    /// only happen if escrow bookkeeping has diverged from the ledger and
    /// is treated as fatal.
    pub fn push_out(
        &mut self,
        asset: &AssetId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        let held = self.custody_of(asset);
        if held < amount {
            tracing::error!(
                %asset,
                to = %to.short(),
                needed = amount,
                held,
                "Custody shortfall on push-out"
            );
            return Err(SwapError::InsufficientCustody {
                asset: asset.clone(),
                needed: amount,
                held,
            });
        }

        let entry = self.ledger.transfer(asset, self.custody, to, amount)?;
        tracing::debug!(%asset, to = %to.short(), amount, seq = entry.seq, "Pushed out of custody");
        Ok(entry)
    }

    /// Undo an entry this adapter produced.
    ///
    /// # Errors
    /// `RollbackFailed` if the ledger cannot restore the prior balances.
    pub fn reverse(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.ledger.reverse(entry).inspect_err(|err| {
            tracing::error!(seq = entry.seq, error = %err, "Ledger reversal failed");
        })
    }

    /// Units of `asset` currently held in custody.
    #[must_use]
    pub fn custody_of(&self, asset: &AssetId) -> Amount {
        self.ledger.balance_of(asset, self.custody)
    }

    /// The custody account this adapter acts for.
    #[must_use]
    pub fn custody_account(&self) -> AccountId {
        self.custody
    }

    /// Read access to the wrapped ledger.
    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable access to the wrapped ledger, for holders acting directly
    /// on it (issuing, approving).
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenLedger;

    fn tkx() -> AssetId {
        AssetId::new("TKX")
    }

    fn setup(supply: Amount) -> (EscrowAdapter<TokenLedger>, AccountId) {
        let alice = AccountId::new();
        let mut ledger = TokenLedger::new();
        ledger.issue(&tkx(), alice, supply).unwrap();
        (EscrowAdapter::new(ledger, AccountId::new()), alice)
    }

    #[test]
    fn pull_in_moves_into_custody() {
        let (mut adapter, alice) = setup(10_000);
        let custody = adapter.custody_account();
        adapter.ledger_mut().approve(&tkx(), alice, custody, 10_000);

        let entry = adapter.pull_in(&tkx(), alice, 999).unwrap();
        assert_eq!(entry.to, custody);
        assert_eq!(adapter.custody_of(&tkx()), 999);
        assert_eq!(adapter.ledger().balance_of(&tkx(), alice), 10_000 - 999);
    }

    #[test]
    fn pull_in_without_approval_fails() {
        let (mut adapter, alice) = setup(10_000);
        let err = adapter.pull_in(&tkx(), alice, 1).unwrap_err();
        assert!(matches!(err, SwapError::InsufficientAuthorization { .. }));
        assert_eq!(adapter.custody_of(&tkx()), 0);
    }

    #[test]
    fn pull_in_beyond_balance_fails() {
        let (mut adapter, alice) = setup(100);
        let custody = adapter.custody_account();
        adapter.ledger_mut().approve(&tkx(), alice, custody, 1_000);
        let err = adapter.pull_in(&tkx(), alice, 101).unwrap_err();
        assert!(matches!(err, SwapError::InsufficientBalance { .. }));
        assert_eq!(adapter.custody_of(&tkx()), 0);
    }

    #[test]
    fn push_out_pays_recipient() {
        let (mut adapter, alice) = setup(1_000);
        let custody = adapter.custody_account();
        adapter.ledger_mut().approve(&tkx(), alice, custody, 1_000);
        adapter.pull_in(&tkx(), alice, 600).unwrap();

        let bob = AccountId::new();
        adapter.push_out(&tkx(), bob, 250).unwrap();
        assert_eq!(adapter.custody_of(&tkx()), 350);
        assert_eq!(adapter.ledger().balance_of(&tkx(), bob), 250);
    }

    #[test]
    fn push_out_beyond_custody_is_fatal() {
        let (mut adapter, _alice) = setup(1_000);
        let err = adapter.push_out(&tkx(), AccountId::new(), 1).unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientCustody {
                needed: 1,
                held: 0,
                ..
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn reverse_pull_in_restores_holder() {
        let (mut adapter, alice) = setup(1_000);
        let custody = adapter.custody_account();
        adapter.ledger_mut().approve(&tkx(), alice, custody, 1_000);
        let entry = adapter.pull_in(&tkx(), alice, 400).unwrap();

        adapter.reverse(&entry).unwrap();
        assert_eq!(adapter.custody_of(&tkx()), 0);
        assert_eq!(adapter.ledger().balance_of(&tkx(), alice), 1_000);
        assert_eq!(adapter.ledger().allowance(&tkx(), alice, custody), 1_000);
    }
}
