//! Custody conservation invariant checker.
//!
//! Audit invariant (strict):
//! ```text
//! ∀ tracked asset: custody(asset) == Σ remaining_amount of present offers escrowing it
//! ```
//!
//! With at most one offer, the right-hand side is that offer's
//! `remaining_amount` for its base asset and zero for every other asset
//! the exchange has handled. Target asset passes through custody within a
//! single operation and must never linger.
//!
//! Custody is an ordinary ledger account, so anyone can send assets to it.
//! Operations therefore check their own effect instead of strict equality:
//! ```text
//! custody_after + expected(current) == custody_before + expected(next)
//! custody_after >= expected(next)
//! ```
//! A surplus left by outside transfers is logged and carried along. A
//! shortfall is fatal.

use std::collections::{BTreeMap, BTreeSet};

use openswap_types::{Amount, AssetId, OfferSlot, Result, SwapError};

/// Custody of every tracked asset at one point in time.
pub type CustodySnapshot = BTreeMap<AssetId, Amount>;

/// Tracks every asset that has passed through custody and validates that
/// custody holds what the offer slot accounts for.
pub struct CustodyConservation {
    tracked: BTreeSet<AssetId>,
}

impl CustodyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracked: BTreeSet::new(),
        }
    }

    /// Start checking `asset` from now on.
    pub fn track(&mut self, asset: &AssetId) {
        if !self.tracked.contains(asset) {
            self.tracked.insert(asset.clone());
        }
    }

    /// Track both assets of a present offer.
    pub fn track_slot(&mut self, slot: &OfferSlot) {
        if let OfferSlot::Present(offer) = slot {
            self.track(&offer.base_asset);
            self.track(&offer.target_asset);
        }
    }

    /// Custody that `slot` accounts for in `asset`.
    #[must_use]
    pub fn expected(slot: &OfferSlot, asset: &AssetId) -> Amount {
        match slot {
            OfferSlot::Present(offer) if offer.base_asset == *asset => offer.remaining_amount,
            _ => 0,
        }
    }

    /// Strict check of one asset.
    ///
    /// # Errors
    /// Returns [`SwapError::CustodyInvariantViolation`] if `held` differs
    /// from what `slot` accounts for.
    pub fn verify(slot: &OfferSlot, asset: &AssetId, held: Amount) -> Result<()> {
        let expected = Self::expected(slot, asset);
        if held != expected {
            return Err(SwapError::CustodyInvariantViolation {
                reason: format!(
                    "Asset {asset}: custody holds {held} but offer accounts for {expected} \
                     (slot {})",
                    slot.state()
                ),
            });
        }
        Ok(())
    }

    /// Strict check of every tracked asset, reading custody through
    /// `custody_of`.
    ///
    /// # Errors
    /// The first violation found, in asset order.
    pub fn verify_all(
        &self,
        slot: &OfferSlot,
        custody_of: impl Fn(&AssetId) -> Amount,
    ) -> Result<()> {
        for asset in &self.tracked {
            Self::verify(slot, asset, custody_of(asset))?;
        }
        Ok(())
    }

    /// Custody of every tracked asset right now.
    #[must_use]
    pub fn snapshot(&self, custody_of: impl Fn(&AssetId) -> Amount) -> CustodySnapshot {
        self.tracked
            .iter()
            .map(|asset| (asset.clone(), custody_of(asset)))
            .collect()
    }

    /// Check that one operation moved custody of `asset` by exactly what
    /// the slot change from `current` to `next` accounts for, and left at
    /// least what `next` needs.
    ///
    /// Returns the surplus left in custody.
    ///
    /// # Errors
    /// [`SwapError::CustodyInvariantViolation`] on a wrong delta or a
    /// shortfall.
    pub fn verify_transition(
        current: &OfferSlot,
        next: &OfferSlot,
        asset: &AssetId,
        before: Amount,
        after: Amount,
    ) -> Result<Amount> {
        let owed_before = Self::expected(current, asset);
        let owed_after = Self::expected(next, asset);

        let balanced = match (after.checked_add(owed_before), before.checked_add(owed_after)) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => false,
        };
        if !balanced {
            return Err(SwapError::CustodyInvariantViolation {
                reason: format!(
                    "Asset {asset}: custody moved {before} -> {after} but offer moved \
                     {owed_before} -> {owed_after}"
                ),
            });
        }
        if after < owed_after {
            return Err(SwapError::CustodyInvariantViolation {
                reason: format!(
                    "Asset {asset}: custody holds {after} but offer accounts for {owed_after} \
                     (slot {})",
                    next.state()
                ),
            });
        }
        Ok(after - owed_after)
    }

    /// [`verify_transition`](Self::verify_transition) for every asset in
    /// `before`.
    ///
    /// # Errors
    /// The first violation found, in asset order.
    pub fn verify_all_transitions(
        current: &OfferSlot,
        next: &OfferSlot,
        before: &CustodySnapshot,
        custody_of: impl Fn(&AssetId) -> Amount,
    ) -> Result<()> {
        for (asset, held_before) in before {
            let surplus =
                Self::verify_transition(current, next, asset, *held_before, custody_of(asset))?;
            if surplus > 0 {
                tracing::warn!(%asset, surplus, "Custody holds more than the offer accounts for");
            }
        }
        Ok(())
    }

    /// Assets currently tracked.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<AssetId> {
        self.tracked.iter().cloned().collect()
    }
}

impl Default for CustodyConservation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openswap_types::{AccountId, OfferRecord};

    fn tkx() -> AssetId {
        AssetId::new("TKX")
    }

    fn tky() -> AssetId {
        AssetId::new("TKY")
    }

    fn present(remaining: Amount) -> OfferSlot {
        OfferSlot::Present(OfferRecord::dummy(AccountId::new(), remaining, 1))
    }

    #[test]
    fn absent_slot_expects_zero() {
        let slot = OfferSlot::Absent;
        assert_eq!(CustodyConservation::expected(&slot, &tkx()), 0);
        assert!(CustodyConservation::verify(&slot, &tkx(), 0).is_ok());
        assert!(CustodyConservation::verify(&slot, &tkx(), 1).is_err());
    }

    #[test]
    fn present_slot_expects_remaining_in_base_only() {
        let slot = present(499);
        assert_eq!(CustodyConservation::expected(&slot, &tkx()), 499);
        assert_eq!(CustodyConservation::expected(&slot, &tky()), 0);
        assert!(CustodyConservation::verify(&slot, &tkx(), 499).is_ok());
        let err = CustodyConservation::verify(&slot, &tkx(), 500).unwrap_err();
        assert!(matches!(err, SwapError::CustodyInvariantViolation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn lingering_target_asset_detected() {
        let mut cc = CustodyConservation::new();
        cc.track(&tkx());
        cc.track(&tky());
        let slot = present(10);
        let ok = cc.verify_all(&slot, |a| if *a == tkx() { 10 } else { 0 });
        assert!(ok.is_ok());
        let bad = cc.verify_all(&slot, |a| if *a == tkx() { 10 } else { 3 });
        assert!(bad.is_err());
    }

    #[test]
    fn track_is_idempotent() {
        let mut cc = CustodyConservation::new();
        cc.track(&tkx());
        cc.track(&tkx());
        cc.track_slot(&present(1));
        assert_eq!(cc.tracked_assets(), vec![tkx(), tky()]);
    }

    #[test]
    fn transition_tolerates_surplus() {
        let current = present(999);
        let next = present(499);
        let surplus =
            CustodyConservation::verify_transition(&current, &next, &tkx(), 1_000, 500).unwrap();
        assert_eq!(surplus, 1);

        let closed = CustodyConservation::verify_transition(
            &current,
            &OfferSlot::Absent,
            &tkx(),
            1_000,
            1,
        )
        .unwrap();
        assert_eq!(closed, 1);
    }

    #[test]
    fn transition_rejects_wrong_delta() {
        let current = present(999);
        let next = present(499);
        let err =
            CustodyConservation::verify_transition(&current, &next, &tkx(), 999, 498).unwrap_err();
        assert!(matches!(err, SwapError::CustodyInvariantViolation { .. }));
    }

    #[test]
    fn transition_rejects_shortfall() {
        let current = present(999);
        let next = present(899);
        // Delta matches, but custody was already short before the operation.
        let err =
            CustodyConservation::verify_transition(&current, &next, &tkx(), 989, 889).unwrap_err();
        assert!(matches!(err, SwapError::CustodyInvariantViolation { .. }));
    }

    #[test]
    fn snapshot_reads_tracked_assets() {
        let mut cc = CustodyConservation::new();
        cc.track_slot(&present(5));
        let snap = cc.snapshot(|a| if *a == tkx() { 5 } else { 0 });
        assert_eq!(snap.get(&tkx()), Some(&5));
        assert_eq!(snap.get(&tky()), Some(&0));
        assert!(
            CustodyConservation::verify_all_transitions(&present(5), &present(5), &snap, |a| {
                if *a == tkx() { 5 } else { 0 }
            })
            .is_ok()
        );
    }
}
