//! # openswap-exchange
//!
//! **Settlement plane**: the single-offer state machine and everything that
//! makes its transitions atomic and auditable.
//!
//! ## Architecture
//!
//! An [`Exchange`] holds at most one offer. For each operation it:
//! 1. Validates caller and input against the current [`OfferSlot`](openswap_types::OfferSlot)
//! 2. Moves custody through a journaled [`UnitOfWork`]
//! 3. Checks with [`CustodyConservation`] that custody moved by exactly
//!    what the slot change accounts for
//! 4. Commits and appends a hash-chained receipt to the [`ReceiptLog`]
//!
//! Concurrent callers go through the [`Sequencer`], which gives every
//! submission a place in one total order. Display clients poll with an
//! [`OfferObserver`].

pub mod custody_conservation;
pub mod exchange;
pub mod observer;
pub mod receipt_log;
pub mod sequencer;
pub mod unit_of_work;

pub use custody_conservation::CustodyConservation;
pub use exchange::{Committed, Exchange};
pub use observer::{OfferObserver, OfferSource, ViewChange};
pub use receipt_log::ReceiptLog;
pub use sequencer::{Command, Sequencer, Submission};
pub use unit_of_work::UnitOfWork;
