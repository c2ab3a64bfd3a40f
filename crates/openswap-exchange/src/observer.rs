//! Polling observer for display clients.
//!
//! Clients do not get pushed updates. They re-read the offer on a fixed
//! interval and redraw when the snapshot changed. [`OfferObserver`]
//! owns that loop state: when the next poll is due and what was seen last.

use std::time::{Duration, Instant};

use openswap_ledger::AssetLedger;
use openswap_types::{ExchangeConfig, OfferView};

use crate::exchange::Exchange;
use crate::sequencer::Sequencer;

/// Anything that can produce an offer snapshot.
pub trait OfferSource {
    fn current_view(&self) -> OfferView;
}

impl<L: AssetLedger> OfferSource for Exchange<L> {
    fn current_view(&self) -> OfferView {
        self.view()
    }
}

impl<L: AssetLedger> OfferSource for Sequencer<L> {
    fn current_view(&self) -> OfferView {
        self.view()
    }
}

/// Difference between two consecutive polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    Unchanged,
    /// An offer exists where there was none.
    Appeared(OfferView),
    /// The same offer changed price or remaining amount.
    Updated(OfferView),
    /// The offer was filled or cancelled.
    Vanished,
}

impl ViewChange {
    fn between(prev: &OfferView, next: &OfferView) -> Self {
        match (prev.exists, next.exists) {
            (false, false) => Self::Unchanged,
            (true, false) => Self::Vanished,
            (false, true) => Self::Appeared(next.clone()),
            // A fill-then-recreate between polls shows up as a new id.
            (true, true) if prev.offer_id != next.offer_id => Self::Appeared(next.clone()),
            (true, true) if prev == next => Self::Unchanged,
            (true, true) => Self::Updated(next.clone()),
        }
    }
}

pub struct OfferObserver {
    interval: Duration,
    last: OfferView,
    last_polled: Option<Instant>,
}

impl OfferObserver {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: OfferView::absent(),
            last_polled: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(config.poll_interval())
    }

    /// Whether a poll is due at `now`. The first poll is always due.
    #[must_use]
    pub fn due(&self, now: Instant) -> bool {
        self.last_polled
            .is_none_or(|at| now.saturating_duration_since(at) >= self.interval)
    }

    /// Poll `source` and report what changed since the previous poll.
    pub fn refresh(&mut self, source: &impl OfferSource, now: Instant) -> ViewChange {
        let next = source.current_view();
        let change = ViewChange::between(&self.last, &next);
        if change != ViewChange::Unchanged {
            tracing::debug!(
                exists = next.exists,
                remaining = next.remaining_amount,
                price = next.price,
                "Offer view changed"
            );
        }
        self.last = next;
        self.last_polled = Some(now);
        change
    }

    /// Snapshot from the most recent poll.
    #[must_use]
    pub fn last_view(&self) -> &OfferView {
        &self.last
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
