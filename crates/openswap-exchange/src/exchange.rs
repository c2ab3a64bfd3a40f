//! The offer settlement state machine.
//!
//! An [`Exchange`] owns one [`OfferSlot`] and one custody account. Each
//! mutating operation:
//! 1. Matches on the slot and validates caller, state, and input
//! 2. Prices the transition and builds the next slot value
//! 3. Prepares the receipt
//! 4. Runs its custody transfers inside a [`UnitOfWork`]
//! 5. Checks that custody moved by exactly what the slot change accounts for
//! 6. Commits transfers, swaps in the next slot, appends the receipt
//!
//! Every rejection happens in steps 1 to 5 and leaves slot, ledger, and
//! receipt log untouched.

use chrono::Utc;
use openswap_ledger::{AssetLedger, EscrowAdapter};
use openswap_types::{
    AccountId, Amount, AssetId, ExchangeConfig, Fill, OfferId, OfferRecord, OfferSlot, OfferState,
    OfferView, Price, Receipt, ReceiptKind, Result, SwapError, constants,
};
use serde::Serialize;

use crate::custody_conservation::CustodyConservation;
use crate::receipt_log::ReceiptLog;
use crate::unit_of_work::UnitOfWork;

/// The result of a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committed {
    /// Sequence of the receipt proving the operation.
    pub receipt_seq: u64,
    /// The offer as it stands after the operation.
    pub view: OfferView,
    /// Fill details, for acceptances.
    pub fill: Option<Fill>,
}

/// A single-offer escrow exchange over an asset ledger `L`.
pub struct Exchange<L> {
    config: ExchangeConfig,
    adapter: EscrowAdapter<L>,
    slot: OfferSlot,
    custody: CustodyConservation,
    receipts: ReceiptLog,
}

impl<L: AssetLedger> Exchange<L> {
    /// Open an exchange with an empty offer slot.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(config: ExchangeConfig, ledger: L) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            owner = %config.owner.short(),
            custody = %config.custody_account.short(),
            "Exchange opened"
        );
        Ok(Self {
            adapter: EscrowAdapter::new(ledger, config.custody_account),
            receipts: ReceiptLog::new(config.receipt_log_capacity),
            slot: OfferSlot::Absent,
            custody: CustodyConservation::new(),
            config,
        })
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Escrow `amount` of `base_asset` from `caller` and list it at `price`
    /// units of `target_asset` per unit.
    ///
    /// # Errors
    /// - `OfferAlreadyExists` if an offer is outstanding
    /// - `InvalidAmount` / `InvalidPrice` if either is zero
    /// - `SameAsset` if base and target coincide
    /// - custody errors from pulling in the base asset
    pub fn create_offer(
        &mut self,
        caller: AccountId,
        base_asset: AssetId,
        target_asset: AssetId,
        amount: Amount,
        price: Price,
    ) -> Result<Committed> {
        const OP: &str = "create_offer";

        if self.slot.is_present() {
            return Self::reject(OP, caller, SwapError::OfferAlreadyExists);
        }
        if amount == 0 {
            return Self::reject(OP, caller, SwapError::InvalidAmount);
        }
        if price == 0 {
            return Self::reject(OP, caller, SwapError::InvalidPrice);
        }
        if base_asset == target_asset {
            return Self::reject(OP, caller, SwapError::SameAsset(base_asset));
        }

        let now = Utc::now();
        let record = OfferRecord {
            id: OfferId::new(),
            initializer: caller,
            base_asset: base_asset.clone(),
            target_asset: target_asset.clone(),
            remaining_amount: amount,
            price,
            created_at: now,
            updated_at: now,
        };
        let offer_id = record.id;
        let next = OfferSlot::Present(record);

        let payload = serde_json::json!({
            "base_asset": base_asset,
            "target_asset": target_asset,
            "amount": amount.to_string(),
            "price": price.to_string(),
        });
        let receipt = self
            .receipts
            .prepare(ReceiptKind::OfferCreated, offer_id, caller, payload)?;
        let receipt_seq = self.commit(OP, caller, next, receipt, |uow| {
            uow.pull_in(&base_asset, caller, amount)
        })?;

        tracing::info!(
            offer = %offer_id,
            initializer = %caller.short(),
            %base_asset,
            %target_asset,
            amount,
            price,
            "Offer created"
        );
        Ok(self.committed(receipt_seq, None))
    }

    /// Reprice the outstanding offer.
    ///
    /// # Errors
    /// `NoExistingOffer`, `NotInitializer`, or `InvalidPrice`, checked in
    /// that order.
    pub fn update_price(&mut self, caller: AccountId, new_price: Price) -> Result<Committed> {
        const OP: &str = "update_price";

        let OfferSlot::Present(offer) = &self.slot else {
            return Self::reject(OP, caller, SwapError::NoExistingOffer);
        };
        if !offer.is_initializer(caller) {
            return Self::reject(OP, caller, SwapError::NotInitializer { caller });
        }
        if new_price == 0 {
            return Self::reject(OP, caller, SwapError::InvalidPrice);
        }

        let old_price = offer.price;
        let offer_id = offer.id;
        let next = OfferSlot::Present(OfferRecord {
            price: new_price,
            updated_at: Utc::now(),
            ..offer.clone()
        });

        let payload = serde_json::json!({
            "old_price": old_price.to_string(),
            "new_price": new_price.to_string(),
        });
        let receipt = self
            .receipts
            .prepare(ReceiptKind::PriceUpdated, offer_id, caller, payload)?;
        let receipt_seq = self.commit(OP, caller, next, receipt, |_| Ok(()))?;

        tracing::info!(offer = %offer_id, old_price, new_price, "Offer repriced");
        Ok(self.committed(receipt_seq, None))
    }

    /// Pay `target_offered` units of target asset for
    /// `target_offered / price` (rounded down) units of base asset.
    ///
    /// The accepter pays the full `target_offered` even when it does not
    /// divide evenly by the price; the remainder is forwarded to the
    /// initializer with the rest and reported in [`Fill::discarded_remainder`].
    /// A fill that drains the offer removes it.
    ///
    /// # Errors
    /// - `NoExistingOffer`
    /// - `ZeroAmount` if nothing would be released
    /// - `TradeTooLarge` if the release exceeds what is escrowed
    /// - custody errors; any of them undoes the whole fill
    pub fn accept_offer(&mut self, caller: AccountId, target_offered: Amount) -> Result<Committed> {
        const OP: &str = "accept_offer";

        let OfferSlot::Present(offer) = &self.slot else {
            return Self::reject(OP, caller, SwapError::NoExistingOffer);
        };
        let fill = match offer.quote_fill(target_offered) {
            Ok(fill) => fill,
            Err(err) => return Self::reject(OP, caller, err),
        };

        let offer_id = offer.id;
        let initializer = offer.initializer;
        let base_asset = offer.base_asset.clone();
        let target_asset = offer.target_asset.clone();
        let next = if fill.is_full() {
            OfferSlot::Absent
        } else {
            OfferSlot::Present(OfferRecord {
                remaining_amount: fill.remaining_after,
                updated_at: Utc::now(),
                ..offer.clone()
            })
        };

        let payload = serde_json::json!({
            "target_paid": fill.target_paid.to_string(),
            "base_released": fill.base_released.to_string(),
            "discarded_remainder": fill.discarded_remainder.to_string(),
            "remaining_after": fill.remaining_after.to_string(),
        });
        let receipt = self
            .receipts
            .prepare(ReceiptKind::OfferAccepted, offer_id, caller, payload)?;
        let receipt_seq = self.commit(OP, caller, next, receipt, |uow| {
            uow.pull_in(&target_asset, caller, fill.target_paid)?;
            uow.push_out(&base_asset, caller, fill.base_released)?;
            uow.push_out(&target_asset, initializer, fill.target_paid)
        })?;

        if fill.discarded_remainder > 0 {
            tracing::debug!(
                offer = %offer_id,
                remainder = fill.discarded_remainder,
                "Inexact fill: remainder paid without base release"
            );
        }
        tracing::info!(
            offer = %offer_id,
            accepter = %caller.short(),
            target_paid = fill.target_paid,
            base_released = fill.base_released,
            remaining = fill.remaining_after,
            closed = fill.is_full(),
            "Offer accepted"
        );
        Ok(self.committed(receipt_seq, Some(fill)))
    }

    /// Withdraw the outstanding offer, returning escrow to the initializer.
    ///
    /// # Errors
    /// `NoExistingOffer` or `NotInitializer`.
    pub fn cancel_offer(&mut self, caller: AccountId) -> Result<Committed> {
        const OP: &str = "cancel_offer";

        let OfferSlot::Present(offer) = &self.slot else {
            return Self::reject(OP, caller, SwapError::NoExistingOffer);
        };
        if !offer.is_initializer(caller) {
            return Self::reject(OP, caller, SwapError::NotInitializer { caller });
        }

        let offer_id = offer.id;
        let refund = offer.remaining_amount;
        let base_asset = offer.base_asset.clone();

        let payload = serde_json::json!({ "refunded": refund.to_string() });
        let receipt = self
            .receipts
            .prepare(ReceiptKind::OfferCancelled, offer_id, caller, payload)?;
        let receipt_seq = self.commit(OP, caller, OfferSlot::Absent, receipt, |uow| {
            uow.push_out(&base_asset, caller, refund)
        })?;

        tracing::info!(offer = %offer_id, refunded = refund, "Offer cancelled");
        Ok(self.committed(receipt_seq, None))
    }

    /// `(remaining_amount, price)` of the outstanding offer.
    ///
    /// # Errors
    /// `NoExistingOffer`.
    pub fn check_offer(&self) -> Result<(Amount, Price)> {
        let offer = self.slot.present()?;
        Ok((offer.remaining_amount, offer.price))
    }

    /// The full outstanding offer.
    ///
    /// # Errors
    /// `NoExistingOffer`.
    pub fn offer(&self) -> Result<&OfferRecord> {
        self.slot.present()
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Polled display snapshot. Never fails.
    #[must_use]
    pub fn view(&self) -> OfferView {
        self.slot.view()
    }

    #[must_use]
    pub fn state(&self) -> OfferState {
        self.slot.state()
    }

    /// The party that deployed this exchange.
    #[must_use]
    pub fn owner(&self) -> AccountId {
        self.config.owner
    }

    #[must_use]
    pub fn custody_account(&self) -> AccountId {
        self.adapter.custody_account()
    }

    /// Units of `asset` in custody right now.
    #[must_use]
    pub fn custody_of(&self, asset: &AssetId) -> Amount {
        self.adapter.custody_of(asset)
    }

    #[must_use]
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    #[must_use]
    pub fn receipts(&self) -> &ReceiptLog {
        &self.receipts
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        self.adapter.ledger()
    }

    /// Direct ledger access for holders (issuing, approving). Anything
    /// done here bypasses the exchange; custody is re-checked on the next
    /// operation.
    pub fn ledger_mut(&mut self) -> &mut L {
        self.adapter.ledger_mut()
    }

    /// Strict audit: custody must equal what the offer slot accounts for,
    /// for every asset handled so far. Unlike the per-operation check, a
    /// surplus sent to the custody account from outside fails here.
    ///
    /// # Errors
    /// `CustodyInvariantViolation` on the first mismatch.
    pub fn verify_custody(&self) -> Result<()> {
        self.custody
            .verify_all(&self.slot, |asset| self.adapter.custody_of(asset))
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn reject<T>(op: &'static str, caller: AccountId, err: SwapError) -> Result<T> {
        tracing::warn!(
            op,
            caller = %caller.short(),
            class = %err.class(),
            error = %err,
            "Operation rejected"
        );
        Err(err)
    }

    /// Run `transfers` atomically and, if they and the custody check
    /// succeed, install `next` and append `receipt`.
    ///
    /// The custody check compares each tracked asset before and after the
    /// transfers against the change from the current slot to `next`.
    fn commit(
        &mut self,
        op: &'static str,
        caller: AccountId,
        next: OfferSlot,
        receipt: Receipt,
        transfers: impl FnOnce(&mut UnitOfWork<'_, L>) -> Result<()>,
    ) -> Result<u64> {
        debug_assert!(next.is_consistent(), "next slot is malformed");

        self.custody.track_slot(&next);
        let before = self.custody.snapshot(|asset| self.adapter.custody_of(asset));

        let mut uow = UnitOfWork::begin(&mut self.adapter);
        let outcome = transfers(&mut uow).and_then(|()| {
            if self.config.verify_custody {
                CustodyConservation::verify_all_transitions(&self.slot, &next, &before, |asset| {
                    uow.custody_of(asset)
                })
            } else {
                Ok(())
            }
        });

        if let Err(err) = outcome {
            uow.rollback()?;
            if err.is_fatal() {
                tracing::error!(
                    op,
                    caller = %caller.short(),
                    error = %err,
                    "Operation aborted on custody fault"
                );
            }
            return Self::reject(op, caller, err);
        }

        let journal = uow.commit();
        self.slot = next;
        let seq = self.receipts.append(receipt)?;
        tracing::debug!(op, receipt = seq, transfers = journal.len(), "Committed");
        Ok(seq)
    }

    fn committed(&self, receipt_seq: u64, fill: Option<Fill>) -> Committed {
        Committed {
            receipt_seq,
            view: self.view(),
            fill,
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

    fn tky() -> AssetId {
        AssetId::new("TKY")
    }

    struct Fixture {
        exchange: Exchange<TokenLedger>,
        alice: AccountId,
        bob: AccountId,
    }

    fn fixture() -> Fixture {
        let alice = AccountId::new();
        let bob = AccountId::new();
        let config = ExchangeConfig::new(AccountId::new(), AccountId::new());
        let custody = config.custody_account;

        let mut ledger = TokenLedger::new();
        ledger.issue(&tkx(), alice, 10_000).unwrap();
        ledger.approve(&tkx(), alice, custody, 10_000);
        ledger.issue(&tky(), bob, 100_000).unwrap();
        ledger.approve(&tky(), bob, custody, 100_000);

        Fixture {
            exchange: Exchange::new(config, ledger).unwrap(),
            alice,
            bob,
        }
    }

    #[test]
    fn starts_absent() {
        let f = fixture();
        assert_eq!(f.exchange.state(), OfferState::Absent);
        assert_eq!(f.exchange.check_offer().unwrap_err(), SwapError::NoExistingOffer);
        assert!(f.exchange.receipts().is_empty());
    }

    #[test]
    fn create_escrows_base() {
        let mut f = fixture();
        let done = f
            .exchange
            .create_offer(f.alice, tkx(), tky(), 999, 1)
            .unwrap();
        assert_eq!(done.receipt_seq, 0);
        assert!(done.view.exists);
        assert_eq!(f.exchange.check_offer().unwrap(), (999, 1));
        assert_eq!(f.exchange.custody_of(&tkx()), 999);
        assert_eq!(f.exchange.ledger().balance_of(&tkx(), f.alice), 10_000 - 999);
        f.exchange.verify_custody().unwrap();
    }

    #[test]
    fn create_rejects_bad_input_before_custody() {
        let mut f = fixture();
        assert_eq!(
            f.exchange.create_offer(f.alice, tkx(), tky(), 0, 1).unwrap_err(),
            SwapError::InvalidAmount
        );
        assert_eq!(
            f.exchange.create_offer(f.alice, tkx(), tky(), 10, 0).unwrap_err(),
            SwapError::InvalidPrice
        );
        assert!(matches!(
            f.exchange.create_offer(f.alice, tkx(), tkx(), 10, 1),
            Err(SwapError::SameAsset(_))
        ));
        assert_eq!(f.exchange.ledger().transfer_count(), 0);
        assert_eq!(f.exchange.state(), OfferState::Absent);
    }

    #[test]
    fn create_fails_cleanly_without_approval() {
        let mut f = fixture();
        let carol = AccountId::new();
        f.exchange.ledger_mut().issue(&tkx(), carol, 50).unwrap();
        let err = f
            .exchange
            .create_offer(carol, tkx(), tky(), 50, 1)
            .unwrap_err();
        assert!(matches!(err, SwapError::InsufficientAuthorization { .. }));
        assert_eq!(f.exchange.state(), OfferState::Absent);
        assert!(f.exchange.receipts().is_empty());
    }

    #[test]
    fn update_price_checks_in_order() {
        let mut f = fixture();
        assert_eq!(
            f.exchange.update_price(f.alice, 2).unwrap_err(),
            SwapError::NoExistingOffer
        );
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();
        assert!(matches!(
            f.exchange.update_price(f.bob, 0),
            Err(SwapError::NotInitializer { .. })
        ));
        assert_eq!(
            f.exchange.update_price(f.alice, 0).unwrap_err(),
            SwapError::InvalidPrice
        );
        let done = f.exchange.update_price(f.alice, 2).unwrap();
        assert_eq!(done.view.price, 2);
        assert_eq!(done.view.remaining_amount, 999);
    }

    #[test]
    fn partial_then_full_accept() {
        let mut f = fixture();
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();

        let partial = f.exchange.accept_offer(f.bob, 500).unwrap();
        let fill = partial.fill.unwrap();
        assert_eq!(fill.base_released, 500);
        assert!(partial.view.exists);
        assert_eq!(f.exchange.custody_of(&tkx()), 499);

        let full = f.exchange.accept_offer(f.bob, 499).unwrap();
        assert!(full.fill.unwrap().is_full());
        assert!(!full.view.exists);
        assert_eq!(f.exchange.state(), OfferState::Absent);
        assert_eq!(f.exchange.custody_of(&tkx()), 0);
        assert_eq!(f.exchange.custody_of(&tky()), 0);
        f.exchange.verify_custody().unwrap();
    }

    #[test]
    fn cancel_refunds_and_clears() {
        let mut f = fixture();
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();
        assert!(matches!(
            f.exchange.cancel_offer(f.bob),
            Err(SwapError::NotInitializer { .. })
        ));
        f.exchange.cancel_offer(f.alice).unwrap();
        assert_eq!(f.exchange.ledger().balance_of(&tkx(), f.alice), 10_000);
        assert_eq!(f.exchange.custody_of(&tkx()), 0);
        assert_eq!(
            f.exchange.cancel_offer(f.alice).unwrap_err(),
            SwapError::NoExistingOffer
        );
    }

    #[test]
    fn receipts_chain_across_operations() {
        let mut f = fixture();
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();
        f.exchange.update_price(f.alice, 3).unwrap();
        f.exchange.accept_offer(f.bob, 30).unwrap();
        f.exchange.cancel_offer(f.alice).unwrap();

        let kinds: Vec<ReceiptKind> = f.exchange.receipts().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ReceiptKind::OfferCreated,
                ReceiptKind::PriceUpdated,
                ReceiptKind::OfferAccepted,
                ReceiptKind::OfferCancelled,
            ]
        );
        f.exchange.receipts().verify_chain().unwrap();
    }

    #[test]
    fn initializer_can_cancel_after_outside_deposit() {
        let mut f = fixture();
        let custody = f.exchange.custody_account();
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();
        f.exchange
            .ledger_mut()
            .transfer(&tkx(), f.alice, custody, 1)
            .unwrap();

        f.exchange.cancel_offer(f.alice).unwrap();
        assert_eq!(f.exchange.ledger().balance_of(&tkx(), f.alice), 10_000 - 1);
        assert_eq!(f.exchange.custody_of(&tkx()), 1);
        assert_eq!(f.exchange.receipts().len(), 2);
    }

    #[test]
    fn rejected_operations_leave_no_receipt() {
        let mut f = fixture();
        f.exchange.create_offer(f.alice, tkx(), tky(), 999, 1).unwrap();
        let _ = f.exchange.accept_offer(f.bob, 0);
        let _ = f.exchange.update_price(f.bob, 5);
        let _ = f.exchange.create_offer(f.bob, tkx(), tky(), 1, 1);
        assert_eq!(f.exchange.receipts().len(), 1);
    }

    #[test]
    fn invalid_config_rejected() {
        let acct = AccountId::new();
        let config = ExchangeConfig::new(acct, acct);
        assert!(matches!(
            Exchange::new(config, TokenLedger::new()),
            Err(SwapError::Configuration(_))
        ));
    }
}
