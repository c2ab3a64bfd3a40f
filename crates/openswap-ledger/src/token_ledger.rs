//! In-memory fungible token ledger.
//!
//! Tracks per-(account, asset) balances and per-(asset, owner, spender)
//! allowances. All mutations are atomic: either the full transfer succeeds
//! or every balance and allowance is unchanged.

use std::collections::HashMap;

use openswap_types::{AccountId, Amount, AssetId, LedgerEntry, Result, SwapError};

use crate::asset_ledger::AssetLedger;

/// An in-process [`AssetLedger`] with ERC-20 style semantics.
///
/// Assets come into existence when first issued; transfers of an asset
/// that was never issued are rejected.
pub struct TokenLedger {
    /// Total issued per asset.
    supplies: HashMap<AssetId, Amount>,
    /// Per-(account, asset) balances.
    balances: HashMap<(AccountId, AssetId), Amount>,
    /// Per-(asset, owner, spender) allowances.
    allowances: HashMap<(AssetId, AccountId, AccountId), Amount>,
    /// Sequence number for the next entry.
    next_seq: u64,
}

impl TokenLedger {
    /// Create an empty ledger with no assets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            supplies: HashMap::new(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Issue `supply` new units of `asset` to `holder`.
    ///
    /// # Errors
    /// Returns `Internal` if the total supply would overflow.
    pub fn issue(&mut self, asset: &AssetId, holder: AccountId, supply: Amount) -> Result<()> {
        let total = self.supplies.entry(asset.clone()).or_insert(0);
        *total = total
            .checked_add(supply)
            .ok_or_else(|| SwapError::Internal(format!("supply overflow for {asset}")))?;
        *self.balances.entry((holder, asset.clone())).or_insert(0) += supply;
        tracing::debug!(%asset, holder = %holder.short(), supply, "Asset issued");
        Ok(())
    }

    /// Set the allowance `owner` grants `spender` over `asset`, replacing
    /// any previous value.
    pub fn approve(
        &mut self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) {
        self.allowances
            .insert((asset.clone(), owner, spender), amount);
    }

    /// Total issued units of `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: &AssetId) -> Amount {
        self.supplies.get(asset).copied().unwrap_or(0)
    }

    /// Sum of all balances of `asset`. Equals `total_supply` unless the
    /// ledger is corrupt.
    #[must_use]
    pub fn circulating(&self, asset: &AssetId) -> Amount {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, bal)| *bal)
            .sum()
    }

    /// Number of transfers finalized so far.
    #[must_use]
    pub fn transfer_count(&self) -> u64 {
        self.next_seq
    }

    fn ensure_issued(&self, asset: &AssetId) -> Result<()> {
        if self.supplies.contains_key(asset) {
            Ok(())
        } else {
            Err(SwapError::UnknownAsset(asset.clone()))
        }
    }

    /// Move balance without any authorization check. Callers have already
    /// validated the transfer.
    fn move_balance(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(SwapError::InsufficientBalance {
                asset: asset.clone(),
                needed: amount,
                available,
            });
        }
        self.balances.insert((from, asset.clone()), available - amount);
        *self.balances.entry((to, asset.clone())).or_insert(0) += amount;
        Ok(())
    }

    fn record(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        spender: Option<AccountId>,
    ) -> LedgerEntry {
        let entry = LedgerEntry {
            seq: self.next_seq,
            asset: asset.clone(),
            from,
            to,
            amount,
            spender,
        };
        self.next_seq += 1;
        entry
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLedger for TokenLedger {
    fn balance_of(&self, asset: &AssetId, account: AccountId) -> Amount {
        self.balances
            .get(&(account, asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, asset: &AssetId, owner: AccountId, spender: AccountId) -> Amount {
        self.allowances
            .get(&(asset.clone(), owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        self.ensure_issued(asset)?;
        self.move_balance(asset, from, to, amount)?;
        Ok(self.record(asset, from, to, amount, None))
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        self.ensure_issued(asset)?;

        // Allowance is checked before balance, and only spent once the
        // balance move has succeeded.
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            return Err(SwapError::InsufficientAuthorization {
                asset: asset.clone(),
                needed: amount,
                allowed,
            });
        }
        self.move_balance(asset, from, to, amount)?;
        self.allowances
            .insert((asset.clone(), from, spender), allowed - amount);

        Ok(self.record(asset, from, to, amount, Some(spender)))
    }

    fn reverse(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.move_balance(&entry.asset, entry.to, entry.from, entry.amount)
            .map_err(|err| SwapError::RollbackFailed {
                reason: format!("cannot reverse entry {}: {err}", entry.seq),
            })?;
        if let Some(spender) = entry.spender {
            *self
                .allowances
                .entry((entry.asset.clone(), entry.from, spender))
                .or_insert(0) += entry.amount;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tkx() -> AssetId {
        AssetId::new("TKX")
    }

    fn funded(holder: AccountId, supply: Amount) -> TokenLedger {
        let mut ledger = TokenLedger::new();
        ledger.issue(&tkx(), holder, supply).unwrap();
        ledger
    }

    #[test]
    fn issue_credits_holder_and_supply() {
        let alice = AccountId::new();
        let ledger = funded(alice, 10_000);
        assert_eq!(ledger.balance_of(&tkx(), alice), 10_000);
        assert_eq!(ledger.total_supply(&tkx()), 10_000);
        assert_eq!(ledger.circulating(&tkx()), 10_000);
    }

    #[test]
    fn transfer_moves_balance() {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let mut ledger = funded(alice, 100);
        let entry = ledger.transfer(&tkx(), alice, bob, 40).unwrap();
        assert_eq!(entry.amount, 40);
        assert!(!entry.consumed_allowance());
        assert_eq!(ledger.balance_of(&tkx(), alice), 60);
        assert_eq!(ledger.balance_of(&tkx(), bob), 40);
        assert_eq!(ledger.transfer_count(), 1);
    }

    #[test]
    fn transfer_insufficient_fails_unchanged() {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let mut ledger = funded(alice, 100);
        let err = ledger.transfer(&tkx(), alice, bob, 101).unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientBalance {
                needed: 101,
                available: 100,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(&tkx(), alice), 100);
        assert_eq!(ledger.transfer_count(), 0);
    }

    #[test]
    fn unknown_asset_rejected() {
        let mut ledger = TokenLedger::new();
        let err = ledger
            .transfer(&AssetId::new("NOPE"), AccountId::new(), AccountId::new(), 1)
            .unwrap_err();
        assert!(matches!(err, SwapError::UnknownAsset(_)));
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let alice = AccountId::new();
        let exchange = AccountId::new();
        let mut ledger = funded(alice, 100);
        let err = ledger
            .transfer_from(&tkx(), exchange, alice, exchange, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientAuthorization {
                needed: 10,
                allowed: 0,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(&tkx(), alice), 100);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let alice = AccountId::new();
        let exchange = AccountId::new();
        let mut ledger = funded(alice, 100);
        ledger.approve(&tkx(), alice, exchange, 100);
        ledger
            .transfer_from(&tkx(), exchange, alice, exchange, 30)
            .unwrap();
        assert_eq!(ledger.allowance(&tkx(), alice, exchange), 70);
        assert_eq!(ledger.balance_of(&tkx(), exchange), 30);
    }

    #[test]
    fn allowance_above_balance_still_fails_on_balance() {
        let alice = AccountId::new();
        let exchange = AccountId::new();
        let mut ledger = funded(alice, 10);
        ledger.approve(&tkx(), alice, exchange, 1_000);
        let err = ledger
            .transfer_from(&tkx(), exchange, alice, exchange, 11)
            .unwrap_err();
        assert!(matches!(err, SwapError::InsufficientBalance { .. }));
        // Allowance untouched on failure
        assert_eq!(ledger.allowance(&tkx(), alice, exchange), 1_000);
    }

    #[test]
    fn reverse_restores_balance_and_allowance() {
        let alice = AccountId::new();
        let exchange = AccountId::new();
        let mut ledger = funded(alice, 100);
        ledger.approve(&tkx(), alice, exchange, 50);
        let entry = ledger
            .transfer_from(&tkx(), exchange, alice, exchange, 50)
            .unwrap();
        ledger.reverse(&entry).unwrap();
        assert_eq!(ledger.balance_of(&tkx(), alice), 100);
        assert_eq!(ledger.balance_of(&tkx(), exchange), 0);
        assert_eq!(ledger.allowance(&tkx(), alice, exchange), 50);
    }

    #[test]
    fn reverse_fails_when_recipient_spent_funds() {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let carol = AccountId::new();
        let mut ledger = funded(alice, 100);
        let entry = ledger.transfer(&tkx(), alice, bob, 100).unwrap();
        ledger.transfer(&tkx(), bob, carol, 60).unwrap();
        let err = ledger.reverse(&entry).unwrap_err();
        assert!(matches!(err, SwapError::RollbackFailed { .. }));
    }

    #[test]
    fn transfers_conserve_supply() {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let mut ledger = funded(alice, 1_000);
        ledger.transfer(&tkx(), alice, bob, 250).unwrap();
        ledger.transfer(&tkx(), bob, alice, 100).unwrap();
        assert_eq!(ledger.circulating(&tkx()), ledger.total_supply(&tkx()));
    }
}
