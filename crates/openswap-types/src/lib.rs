//! # openswap-types
//!
//! Shared types, errors, and configuration for the **OpenSwap** exchange.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`AssetId`], [`OfferId`], [`SubmissionId`]
//! - **Quantities**: [`Amount`], [`Price`], [`LedgerEntry`]
//! - **Offer model**: [`OfferRecord`], [`OfferSlot`], [`Fill`], [`OfferView`], [`OfferForm`]
//! - **Receipts**: [`Receipt`], [`ReceiptKind`]
//! - **Configuration**: [`ExchangeConfig`]
//! - **Errors**: [`SwapError`] with `SW_ERR_` prefix codes
//! - **Constants**: defaults and identification

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod offer;
pub mod receipt;

pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use offer::*;
pub use receipt::*;

// Constants are accessed via `openswap_types::constants::FOO`
// (not re-exported to avoid name collisions).
