//! Error types for the OpenSwap exchange.
//!
//! All errors use the `SW_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Validation errors (caller input out of range)
//! - 2xx: Authorization errors
//! - 3xx: Offer lifecycle state errors
//! - 4xx: Custody errors surfaced by the ledger adapter
//! - 5xx: Invariant violations
//! - 9xx: General / internal errors

use std::fmt;

use thiserror::Error;

use crate::{AccountId, Amount, AssetId};

/// Central error enum for all OpenSwap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Offer amount must be strictly positive.
    #[error("SW_ERR_100: Invalid amount: must be > 0")]
    InvalidAmount,

    /// Price must be strictly positive.
    #[error("SW_ERR_101: Invalid price: must be > 0")]
    InvalidPrice,

    /// Accept called with a zero amount, or one that floors to zero base units.
    #[error("SW_ERR_102: Must accept non-zero amount (offered {offered} at price {price})")]
    ZeroAmount { offered: Amount, price: Amount },

    /// The requested fill exceeds the escrowed supply.
    #[error("SW_ERR_103: Trade too large: requested {requested}, remaining {remaining}")]
    TradeTooLarge { requested: Amount, remaining: Amount },

    /// Base and target asset are the same asset class.
    #[error("SW_ERR_104: Base and target asset must differ (both {0})")]
    SameAsset(AssetId),

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// Only the initializer may reprice or cancel the offer.
    #[error("SW_ERR_200: Not owner of offer: caller {caller}")]
    NotInitializer { caller: AccountId },

    // =================================================================
    // Offer State Errors (3xx)
    // =================================================================
    /// An offer is already outstanding on this exchange.
    #[error("SW_ERR_300: Already have offer listed")]
    OfferAlreadyExists,

    /// No offer is outstanding on this exchange.
    #[error("SW_ERR_301: No existing offer")]
    NoExistingOffer,

    // =================================================================
    // Custody Errors (4xx)
    // =================================================================
    /// The debited party does not hold enough of the asset.
    #[error("SW_ERR_400: Insufficient balance of {asset}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: AssetId,
        needed: Amount,
        available: Amount,
    },

    /// The debited party has not authorized the exchange for enough.
    #[error("SW_ERR_401: Insufficient authorization for {asset}: need {needed}, allowed {allowed}")]
    InsufficientAuthorization {
        asset: AssetId,
        needed: Amount,
        allowed: Amount,
    },

    /// Custody holds less than a push-out requires. Fatal.
    #[error("SW_ERR_402: Insufficient custody of {asset}: need {needed}, held {held}")]
    InsufficientCustody {
        asset: AssetId,
        needed: Amount,
        held: Amount,
    },

    /// The asset has never been issued on the ledger.
    #[error("SW_ERR_403: Unknown asset: {0}")]
    UnknownAsset(AssetId),

    // =================================================================
    // Invariant Violations (5xx)
    // =================================================================
    /// Escrowed custody diverged from offer bookkeeping. Fatal.
    #[error("SW_ERR_500: Custody invariant violation: {reason}")]
    CustodyInvariantViolation { reason: String },

    /// The receipt hash chain does not verify.
    #[error("SW_ERR_501: Receipt chain broken at sequence {seq}")]
    ReceiptChainBroken { seq: u64 },

    /// A ledger entry could not be reversed during rollback. Fatal.
    #[error("SW_ERR_502: Rollback failed: {reason}")]
    RollbackFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SW_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SW_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values).
    #[error("SW_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    Authorization,
    State,
    Custody,
    Invariant,
    General,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::State => write!(f, "STATE"),
            Self::Custody => write!(f, "CUSTODY"),
            Self::Invariant => write!(f, "INVARIANT"),
            Self::General => write!(f, "GENERAL"),
        }
    }
}

impl SwapError {
    /// The class this error belongs to.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAmount
            | Self::InvalidPrice
            | Self::ZeroAmount { .. }
            | Self::TradeTooLarge { .. }
            | Self::SameAsset(_) => ErrorClass::Validation,
            Self::NotInitializer { .. } => ErrorClass::Authorization,
            Self::OfferAlreadyExists | Self::NoExistingOffer => ErrorClass::State,
            Self::InsufficientBalance { .. }
            | Self::InsufficientAuthorization { .. }
            | Self::InsufficientCustody { .. }
            | Self::UnknownAsset(_) => ErrorClass::Custody,
            Self::CustodyInvariantViolation { .. }
            | Self::ReceiptChainBroken { .. }
            | Self::RollbackFailed { .. } => ErrorClass::Invariant,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorClass::General
            }
        }
    }

    /// Whether this error means the exchange's own bookkeeping is broken.
    ///
    /// Fatal errors are never the caller's fault and are not recoverable by
    /// resubmitting.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCustody { .. }
                | Self::CustodyInvariantViolation { .. }
                | Self::RollbackFailed { .. }
                | Self::Internal(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SwapError>;

impl From<serde_json::Error> for SwapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
