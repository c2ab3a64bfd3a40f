//! Hash-chained receipts for the OpenSwap audit trail.
//!
//! Every committed exchange operation produces a [`Receipt`]. Each receipt
//! commits to its payload and to the hash of the receipt before it, so a
//! rewritten or dropped entry breaks the chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, OfferId, Result};

/// `prev_hash` of the first receipt in a chain.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// The committed operation a receipt proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    OfferCreated,
    PriceUpdated,
    OfferAccepted,
    OfferCancelled,
}

impl std::fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OfferCreated => write!(f, "OFFER_CREATED"),
            Self::PriceUpdated => write!(f, "PRICE_UPDATED"),
            Self::OfferAccepted => write!(f, "OFFER_ACCEPTED"),
            Self::OfferCancelled => write!(f, "OFFER_CANCELLED"),
        }
    }
}

/// One link of the receipt chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Position in the chain, starting at 0.
    pub seq: u64,
    pub kind: ReceiptKind,
    pub offer_id: OfferId,
    /// The caller whose operation committed.
    pub actor: AccountId,
    /// Operation-specific details (amounts, prices, fill outcome).
    pub payload: serde_json::Value,
    /// SHA-256 of the serialized payload.
    pub payload_hash: [u8; 32],
    /// `hash` of the previous receipt, or [`GENESIS_HASH`].
    pub prev_hash: [u8; 32],
    /// SHA-256 over this receipt's header fields and `prev_hash`.
    pub hash: [u8; 32],
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    /// Build the next receipt after `prev_hash`.
    ///
    /// # Errors
    /// Returns `Serialization` if the payload cannot be encoded.
    pub fn issue(
        seq: u64,
        prev_hash: [u8; 32],
        kind: ReceiptKind,
        offer_id: OfferId,
        actor: AccountId,
        payload: serde_json::Value,
    ) -> Result<Self> {
        let payload_hash = Self::hash_payload(&payload)?;
        let hash = Self::link_hash(seq, kind, offer_id, actor, &payload_hash, &prev_hash);
        Ok(Self {
            seq,
            kind,
            offer_id,
            actor,
            payload,
            payload_hash,
            prev_hash,
            hash,
            issued_at: Utc::now(),
        })
    }

    fn hash_payload(payload: &serde_json::Value) -> Result<[u8; 32]> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Sha256::digest(&bytes).into())
    }

    fn link_hash(
        seq: u64,
        kind: ReceiptKind,
        offer_id: OfferId,
        actor: AccountId,
        payload_hash: &[u8; 32],
        prev_hash: &[u8; 32],
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"openswap:receipt:v1:");
        hasher.update(seq.to_le_bytes());
        hasher.update(kind.to_string().as_bytes());
        hasher.update(offer_id.0.as_bytes());
        hasher.update(actor.0.as_bytes());
        hasher.update(payload_hash);
        hasher.update(prev_hash);
        hasher.finalize().into()
    }

    /// Recompute both hashes and compare against the stored ones.
    #[must_use]
    pub fn verify(&self) -> bool {
        let Ok(payload_hash) = Self::hash_payload(&self.payload) else {
            return false;
        };
        payload_hash == self.payload_hash
            && Self::link_hash(
                self.seq,
                self.kind,
                self.offer_id,
                self.actor,
                &self.payload_hash,
                &self.prev_hash,
            ) == self.hash
    }

    /// Hex form of `hash`, for logs.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
