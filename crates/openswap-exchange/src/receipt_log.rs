//! Bounded, hash-chained receipt log.
//!
//! Like the settlement idempotency cache it replaces, the log keeps a
//! bounded window so memory stays predictable in long-running exchanges:
//! once `capacity` is reached the oldest receipt is pruned. The chain
//! hash carries forward across pruning, so the retained window still
//! verifies end to end.

use std::collections::VecDeque;

use openswap_types::{
    AccountId, OfferId, Receipt, ReceiptKind, Result, SwapError, receipt::GENESIS_HASH,
};

/// Append-only receipt chain with LRU-style pruning.
pub struct ReceiptLog {
    /// Retained receipts (front = oldest).
    receipts: VecDeque<Receipt>,
    /// Maximum number of retained receipts.
    capacity: usize,
    /// Sequence of the next receipt.
    next_seq: u64,
    /// Hash of the most recent receipt.
    last_hash: [u8; 32],
}

impl ReceiptLog {
    /// Create an empty log retaining at most `capacity` receipts.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ReceiptLog capacity must be > 0");
        Self {
            receipts: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
            last_hash: GENESIS_HASH,
        }
    }

    /// Build the next receipt without appending it.
    ///
    /// Exchange operations prepare their receipt before touching custody
    /// so the append after commit cannot fail.
    ///
    /// # Errors
    /// `Serialization` if the payload cannot be encoded.
    pub fn prepare(
        &self,
        kind: ReceiptKind,
        offer_id: OfferId,
        actor: AccountId,
        payload: serde_json::Value,
    ) -> Result<Receipt> {
        Receipt::issue(self.next_seq, self.last_hash, kind, offer_id, actor, payload)
    }

    /// Append a receipt produced by [`prepare`](Self::prepare).
    ///
    /// # Errors
    /// `ReceiptChainBroken` if the receipt does not extend the current head.
    pub fn append(&mut self, receipt: Receipt) -> Result<u64> {
        if receipt.seq != self.next_seq || receipt.prev_hash != self.last_hash {
            return Err(SwapError::ReceiptChainBroken { seq: receipt.seq });
        }

        if self.receipts.len() >= self.capacity {
            self.receipts.pop_front();
        }

        let seq = receipt.seq;
        self.last_hash = receipt.hash;
        self.next_seq += 1;
        self.receipts.push_back(receipt);
        Ok(seq)
    }

    /// Verify every retained receipt and every link between them.
    ///
    /// # Errors
    /// `ReceiptChainBroken` at the first receipt that fails.
    pub fn verify_chain(&self) -> Result<()> {
        let mut prev: Option<&Receipt> = None;
        for receipt in &self.receipts {
            let linked =
                prev.is_none_or(|p| p.hash == receipt.prev_hash && p.seq + 1 == receipt.seq);
            if !linked || !receipt.verify() {
                return Err(SwapError::ReceiptChainBroken { seq: receipt.seq });
            }
            prev = Some(receipt);
        }
        match self.receipts.back() {
            Some(head) if head.hash != self.last_hash => {
                Err(SwapError::ReceiptChainBroken { seq: head.seq })
            }
            _ => Ok(()),
        }
    }

    /// Most recent receipt.
    #[must_use]
    pub fn latest(&self) -> Option<&Receipt> {
        self.receipts.back()
    }

    /// Retained receipts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.iter()
    }

    /// Receipts retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Receipts ever appended, including pruned ones.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.next_seq
    }

    #[cfg(test)]
    pub(crate) fn receipts_mut(&mut self) -> &mut VecDeque<Receipt> {
        &mut self.receipts
    }
}
