//! # openswap-ledger
//!
//! **Custody layer**: the narrow contract between an exchange and the
//! external asset ledger it escrows on.
//!
//! ## Architecture
//!
//! 1. **AssetLedger**: the consumed interface of an external fungible-token
//!    ledger (balances, allowances, transfers, exact reversal)
//! 2. **TokenLedger**: an in-memory `AssetLedger` with issue / approve /
//!    transfer semantics
//! 3. **EscrowAdapter**: `pull_in` / `push_out` on behalf of one custody
//!    account, mapping ledger rejections to custody errors
//!
//! ## Custody Flow
//!
//! ```text
//! holder.approve(custody) → EscrowAdapter.pull_in() → custody
//! custody → EscrowAdapter.push_out() → recipient
//! ```
//!
//! The adapter owns no offer state; it never decides *whether* to move
//! funds, only performs the move and reports the finalized entry.

pub mod asset_ledger;
pub mod escrow_adapter;
pub mod token_ledger;

pub use asset_ledger::AssetLedger;
pub use escrow_adapter::EscrowAdapter;
pub use token_ledger::TokenLedger;
