//! The offer model: the single outstanding escrow trade of an exchange.
//!
//! ## State Machine
//!
//! ```text
//!            create                 update_price / partial accept
//!   ┌────────┐ ───────▶ ┌─────────┐ ◀──────┐
//!   │ ABSENT │          │ PRESENT │ ───────┘
//!   └────────┘ ◀─────── └─────────┘
//!          full accept / cancel
//! ```
//!
//! An exchange starts `ABSENT` and cycles indefinitely; there is no
//! terminal state. While `PRESENT`, `remaining_amount > 0` and `price > 0`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, AssetId, OfferId, Price, Result, SwapError};

/// Coarse lifecycle state of an exchange's offer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferState {
    Absent,
    Present,
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "ABSENT"),
            Self::Present => write!(f, "PRESENT"),
        }
    }
}

/// A present offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub id: OfferId,
    /// The party that created the offer; sole authority to reprice or cancel.
    pub initializer: AccountId,
    /// The asset held in escrow and released to accepters.
    pub base_asset: AssetId,
    /// The asset accepters pay in, credited to the initializer.
    pub target_asset: AssetId,
    /// Escrowed base quantity still available.
    pub remaining_amount: Amount,
    /// Target units per base unit.
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferRecord {
    /// Price a fill for `target_offered` units of target asset.
    ///
    /// The released base quantity is `target_offered / price`, rounded
    /// down. Whatever does not divide evenly is still paid by the accepter
    /// and reported as `discarded_remainder`.
    ///
    /// # Errors
    /// - `ZeroAmount` if `target_offered` is zero or floors to zero base units
    /// - `TradeTooLarge` if the release would exceed `remaining_amount`
    pub fn quote_fill(&self, target_offered: Amount) -> Result<Fill> {
        let zero = SwapError::ZeroAmount {
            offered: target_offered,
            price: self.price,
        };
        if target_offered == 0 || self.price == 0 {
            return Err(zero);
        }

        let base_released = target_offered / self.price;
        if base_released == 0 {
            return Err(zero);
        }
        if base_released > self.remaining_amount {
            return Err(SwapError::TradeTooLarge {
                requested: base_released,
                remaining: self.remaining_amount,
            });
        }

        Ok(Fill {
            target_paid: target_offered,
            base_released,
            discarded_remainder: target_offered % self.price,
            remaining_after: self.remaining_amount - base_released,
        })
    }

    /// Whether `account` may reprice or cancel this offer.
    #[must_use]
    pub fn is_initializer(&self, account: AccountId) -> bool {
        self.initializer == account
    }

    /// A present offer always has something left to sell at a nonzero price.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.remaining_amount > 0 && self.price > 0 && self.base_asset != self.target_asset
    }
}

/// The priced outcome of one acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Target units pulled from the accepter and forwarded to the initializer.
    pub target_paid: Amount,
    /// Base units released from escrow to the accepter.
    pub base_released: Amount,
    /// `target_paid - base_released * price`: paid but not converted.
    pub discarded_remainder: Amount,
    /// Escrowed base units left after this fill.
    pub remaining_after: Amount,
}

impl Fill {
    /// Whether this fill drains the offer.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.remaining_after == 0
    }
}

/// The offer slot owned by an exchange instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferSlot {
    #[default]
    Absent,
    Present(OfferRecord),
}

impl OfferSlot {
    #[must_use]
    pub fn state(&self) -> OfferState {
        match self {
            Self::Absent => OfferState::Absent,
            Self::Present(_) => OfferState::Present,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Borrow the present offer.
    ///
    /// # Errors
    /// Returns `NoExistingOffer` when the slot is empty.
    pub fn present(&self) -> Result<&OfferRecord> {
        match self {
            Self::Present(offer) => Ok(offer),
            Self::Absent => Err(SwapError::NoExistingOffer),
        }
    }

    /// Base units this slot accounts for in escrow (0 when absent).
    #[must_use]
    pub fn escrowed(&self) -> Amount {
        match self {
            Self::Present(offer) => offer.remaining_amount,
            Self::Absent => 0,
        }
    }

    /// Absent, or present and well formed.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self {
            Self::Present(offer) => offer.is_well_formed(),
            Self::Absent => true,
        }
    }

    /// The polled display tuple for this slot.
    #[must_use]
    pub fn view(&self) -> OfferView {
        match self {
            Self::Present(offer) => OfferView {
                exists: true,
                offer_id: Some(offer.id),
                initializer: Some(offer.initializer),
                base_asset: Some(offer.base_asset.clone()),
                target_asset: Some(offer.target_asset.clone()),
                remaining_amount: offer.remaining_amount,
                price: offer.price,
            },
            Self::Absent => OfferView::absent(),
        }
    }
}

/// Read-only snapshot of an exchange's offer, as polled by display clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferView {
    pub exists: bool,
    pub offer_id: Option<OfferId>,
    pub initializer: Option<AccountId>,
    pub base_asset: Option<AssetId>,
    pub target_asset: Option<AssetId>,
    pub remaining_amount: Amount,
    pub price: Price,
}

/// Which form a display client should present to the connected party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferForm {
    /// No offer outstanding: anyone may create one.
    Create,
    /// The viewer is the initializer: reprice or cancel.
    ModifyOrCancel,
    /// Someone else's offer: accept it.
    Accept,
}

impl OfferView {
    #[must_use]
    pub fn absent() -> Self {
        Self {
            exists: false,
            offer_id: None,
            initializer: None,
            base_asset: None,
            target_asset: None,
            remaining_amount: 0,
            price: 0,
        }
    }

    /// Pick the form to present to `viewer`.
    #[must_use]
    pub fn form_for(&self, viewer: AccountId) -> OfferForm {
        match self.initializer {
            _ if !self.exists => OfferForm::Create,
            Some(initializer) if initializer == viewer => OfferForm::ModifyOrCancel,
            _ => OfferForm::Accept,
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl OfferRecord {
    pub fn dummy(initializer: AccountId, remaining_amount: Amount, price: Price) -> Self {
        let now = Utc::now();
        Self {
            id: OfferId::new(),
            initializer,
            base_asset: AssetId::new("TKX"),
            target_asset: AssetId::new("TKY"),
            remaining_amount,
            price,
            created_at: now,
            updated_at: now,
        }
    }
}
