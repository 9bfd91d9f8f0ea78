//! Append-only per-card transaction history

use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;

/// Append-only ledger of completed operations, physically attached to cards
pub struct TransactionLedger<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> TransactionLedger<S> {
    /// Create a new transaction ledger
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Append an entry to the end of the card's history
    pub async fn append(&self, card_token: &str, transaction: &Transaction) -> LedgerResult<()> {
        self.storage.append_transaction(card_token, transaction).await
    }

    /// Entries whose date falls within `[from, to]`, both bounds inclusive,
    /// in insertion order
    pub async fn query(
        &self,
        card_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage.get_card_transactions(card_token, from, to).await
    }
}
