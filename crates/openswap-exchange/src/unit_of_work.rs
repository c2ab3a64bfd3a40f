//! Unit of work over custody transfers.
//!
//! Every mutating exchange operation runs its transfers inside one
//! [`UnitOfWork`]. Each finalized ledger entry is journaled; if any later
//! step fails, the journal is reversed newest-first so the ledger ends up
//! exactly where it started. Only [`UnitOfWork::commit`] keeps the effects.

use openswap_ledger::{AssetLedger, EscrowAdapter};
use openswap_types::{AccountId, Amount, AssetId, LedgerEntry, Result, SwapError};

/// A journaled sequence of custody transfers that commits or rolls back
/// as one.
pub struct UnitOfWork<'a, L: AssetLedger> {
    adapter: &'a mut EscrowAdapter<L>,
    journal: Vec<LedgerEntry>,
    finished: bool,
}

impl<'a, L: AssetLedger> UnitOfWork<'a, L> {
    /// Open a unit of work against `adapter`.
    pub fn begin(adapter: &'a mut EscrowAdapter<L>) -> Self {
        Self {
            adapter,
            journal: Vec::new(),
            finished: false,
        }
    }

    /// Journaled [`EscrowAdapter::pull_in`].
    pub fn pull_in(&mut self, asset: &AssetId, from: AccountId, amount: Amount) -> Result<()> {
        let entry = self.adapter.pull_in(asset, from, amount)?;
        self.journal.push(entry);
        Ok(())
    }

    /// Journaled [`EscrowAdapter::push_out`].
    pub fn push_out(&mut self, asset: &AssetId, to: AccountId, amount: Amount) -> Result<()> {
        let entry = self.adapter.push_out(asset, to, amount)?;
        self.journal.push(entry);
        Ok(())
    }

    /// Custody of `asset` as it stands inside this unit of work.
    #[must_use]
    pub fn custody_of(&self, asset: &AssetId) -> Amount {
        self.adapter.custody_of(asset)
    }

    /// Entries finalized so far.
    #[must_use]
    pub fn journal(&self) -> &[LedgerEntry] {
        &self.journal
    }

    /// Keep every transfer and hand back the journal.
    pub fn commit(mut self) -> Vec<LedgerEntry> {
        self.finished = true;
        std::mem::take(&mut self.journal)
    }

    /// Reverse every journaled transfer, newest first.
    ///
    /// # Errors
    /// `RollbackFailed` if the ledger refuses a reversal. The ledger is then
    /// in an indeterminate state and the error is fatal.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.unwind()
    }

    fn unwind(&mut self) -> Result<()> {
        let undone = self.journal.len();
        while let Some(entry) = self.journal.pop() {
            self.adapter.reverse(&entry).map_err(|err| match err {
                SwapError::RollbackFailed { .. } => err,
                other => SwapError::RollbackFailed {
                    reason: other.to_string(),
                },
            })?;
        }
        if undone > 0 {
            tracing::warn!(undone, "Unit of work rolled back");
        }
        Ok(())
    }
}

impl<L: AssetLedger> Drop for UnitOfWork<'_, L> {
    fn drop(&mut self) {
        if !self.finished && !self.journal.is_empty() {
            if let Err(err) = self.unwind() {
                tracing::error!(
                    error = %err,
                    "Unit of work dropped mid-flight and could not roll back"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openswap_ledger::TokenLedger;

    fn tkx() -> AssetId {
        AssetId::new("TKX")
    }

    fn setup() -> (EscrowAdapter<TokenLedger>, AccountId) {
        let alice = AccountId::new();
        let custody = AccountId::new();
        let mut ledger = TokenLedger::new();
        ledger.issue(&tkx(), alice, 1_000).unwrap();
        ledger.approve(&tkx(), alice, custody, 1_000);
        (EscrowAdapter::new(ledger, custody), alice)
    }

    #[test]
    fn commit_keeps_transfers() {
        let (mut adapter, alice) = setup();
        let mut uow = UnitOfWork::begin(&mut adapter);
        uow.pull_in(&tkx(), alice, 300).unwrap();
        assert_eq!(uow.custody_of(&tkx()), 300);
        let journal = uow.commit();
        assert_eq!(journal.len(), 1);
        assert_eq!(adapter.custody_of(&tkx()), 300);
    }

    #[test]
    fn rollback_reverses_all_steps() {
        let (mut adapter, alice) = setup();
        let bob = AccountId::new();
        let mut uow = UnitOfWork::begin(&mut adapter);
        uow.pull_in(&tkx(), alice, 300).unwrap();
        uow.push_out(&tkx(), bob, 100).unwrap();
        assert_eq!(uow.journal().len(), 2);
        uow.rollback().unwrap();

        assert_eq!(adapter.custody_of(&tkx()), 0);
        assert_eq!(adapter.ledger().balance_of(&tkx(), alice), 1_000);
        assert_eq!(adapter.ledger().balance_of(&tkx(), bob), 0);
        assert_eq!(
            adapter
                .ledger()
                .allowance(&tkx(), alice, adapter.custody_account()),
            1_000
        );
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let (mut adapter, alice) = setup();
        {
            let mut uow = UnitOfWork::begin(&mut adapter);
            uow.pull_in(&tkx(), alice, 500).unwrap();
        }
        assert_eq!(adapter.custody_of(&tkx()), 0);
        assert_eq!(adapter.ledger().balance_of(&tkx(), alice), 1_000);
    }

    #[test]
    fn failed_step_leaves_journal_intact_for_rollback() {
        let (mut adapter, alice) = setup();
        let mut uow = UnitOfWork::begin(&mut adapter);
        uow.pull_in(&tkx(), alice, 200).unwrap();
        let err = uow.push_out(&tkx(), alice, 201).unwrap_err();
        assert!(matches!(err, SwapError::InsufficientCustody { .. }));
        assert_eq!(uow.journal().len(), 1);
        uow.rollback().unwrap();
        assert_eq!(adapter.ledger().balance_of(&tkx(), alice), 1_000);
    }
}
