//! Serialized command submission.
//!
//! Concurrent callers hand a [`Command`] to the [`Sequencer`], which runs
//! commands one at a time against the exchange in arrival order. Every
//! submission is stamped with a [`SubmissionId`] so callers racing for the
//! same offer can tell who went first: the earlier submission sees the
//! offer, the later one sees whatever the earlier one left behind.

use std::sync::{Mutex, MutexGuard, PoisonError};

use openswap_ledger::AssetLedger;
use openswap_types::{AccountId, Amount, AssetId, OfferView, Price, Result, SubmissionId};
use serde::{Deserialize, Serialize};

use crate::exchange::{Committed, Exchange};

/// A mutating request against the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateOffer {
        caller: AccountId,
        base_asset: AssetId,
        target_asset: AssetId,
        amount: Amount,
        price: Price,
    },
    UpdatePrice {
        caller: AccountId,
        new_price: Price,
    },
    AcceptOffer {
        caller: AccountId,
        target_amount: Amount,
    },
    CancelOffer {
        caller: AccountId,
    },
}

impl Command {
    #[must_use]
    pub fn caller(&self) -> AccountId {
        match self {
            Self::CreateOffer { caller, .. }
            | Self::UpdatePrice { caller, .. }
            | Self::AcceptOffer { caller, .. }
            | Self::CancelOffer { caller } => *caller,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateOffer { .. } => "create_offer",
            Self::UpdatePrice { .. } => "update_price",
            Self::AcceptOffer { .. } => "accept_offer",
            Self::CancelOffer { .. } => "cancel_offer",
        }
    }
}

/// What happened to one submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Position in the total order of submissions.
    pub id: SubmissionId,
    pub outcome: Result<Committed>,
}

struct Inner<L> {
    exchange: Exchange<L>,
    next_id: SubmissionId,
}

/// Mutex-guarded exchange applying commands in a single total order.
pub struct Sequencer<L> {
    inner: Mutex<Inner<L>>,
}

impl<L: AssetLedger> Sequencer<L> {
    pub fn new(exchange: Exchange<L>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                exchange,
                next_id: SubmissionId(0),
            }),
        }
    }

    /// Apply `command` after every earlier submission.
    pub fn submit(&self, command: Command) -> Submission {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id = id.next();

        tracing::trace!(
            submission = %id,
            op = command.name(),
            caller = %command.caller().short(),
            "Sequenced"
        );
        let exchange = &mut inner.exchange;
        let outcome = match command {
            Command::CreateOffer {
                caller,
                base_asset,
                target_asset,
                amount,
                price,
            } => exchange.create_offer(caller, base_asset, target_asset, amount, price),
            Command::UpdatePrice { caller, new_price } => exchange.update_price(caller, new_price),
            Command::AcceptOffer {
                caller,
                target_amount,
            } => exchange.accept_offer(caller, target_amount),
            Command::CancelOffer { caller } => exchange.cancel_offer(caller),
        };
        Submission { id, outcome }
    }

    /// Current offer snapshot.
    pub fn view(&self) -> OfferView {
        self.lock().exchange.view()
    }

    /// Run `f` with exclusive access to the exchange, between submissions.
    pub fn with_exchange<R>(&self, f: impl FnOnce(&mut Exchange<L>) -> R) -> R {
        f(&mut self.lock().exchange)
    }

    /// Submissions sequenced so far.
    pub fn submitted(&self) -> u64 {
        self.lock().next_id.0
    }

    pub fn into_inner(self) -> Exchange<L> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .exchange
    }

    // Unit-of-work drop unwinds partial transfers, so a poisoned exchange
    // is still coherent.
    fn lock(&self) -> MutexGuard<'_, Inner<L>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
