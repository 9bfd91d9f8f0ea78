//! Storage abstraction for the card ledger system

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// A balance mutation requested from storage
///
/// Debits are conditional: storage must perform the read-check-write as one
/// atomic step with respect to other writers on the same field, and refuse
/// the debit (rather than go negative) when funds are insufficient. Credits
/// are unconditional.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceDelta {
    Credit(BigDecimal),
    Debit(BigDecimal),
}

/// Result of applying a [`BalanceDelta`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BalanceChange {
    /// The mutation committed; `new_balance` is the post-mutation value
    Applied { new_balance: BigDecimal },
    /// A conditional debit was refused; `available` is the untouched balance
    Insufficient { available: BigDecimal },
}

/// Result of atomically sweeping a card's cashback into its available balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashbackRedemption {
    /// Amount moved out of the cashback bucket
    pub redeemed: BigDecimal,
    /// Available balance after the credit
    pub new_available: BigDecimal,
}

/// Storage abstraction for the ledger engine
///
/// Allows the engine to work against any backend (document store, SQL,
/// in-memory) by implementing these methods. Single-record updates must be
/// atomic per record; the conditional-debit methods must be atomic with
/// respect to other writers on the same balance field. Appends to the same
/// card's transaction history must never be lost or reordered relative to
/// each other.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    // --- clients ---

    /// Save (insert or replace) a client record
    async fn save_client(&self, client: &Client) -> LedgerResult<()>;

    /// Get a client by id
    async fn get_client(&self, client_id: &str) -> LedgerResult<Option<Client>>;

    /// Overwrite one client balance field, creating the currency entry if absent
    async fn set_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()>;

    /// Atomically apply a delta to one client balance field
    async fn adjust_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange>;

    /// Update a client's contact mobile number
    async fn set_client_mobile(&self, client_id: &str, mobile: &str) -> LedgerResult<()>;

    /// Record a QR withdrawal request against the client with this mobile
    async fn append_qr_withdrawal(
        &self,
        mobile: &str,
        entry: &QrWithdrawal,
    ) -> LedgerResult<()>;

    // --- cards ---

    /// Insert a new card; fails with a storage error if the token is taken
    async fn insert_card(&self, card: &Card) -> LedgerResult<()>;

    /// Get a card by token
    async fn get_card(&self, card_token: &str) -> LedgerResult<Option<Card>>;

    /// All cards owned by a client, in storage order
    async fn list_cards(&self, client_id: &str) -> LedgerResult<Vec<Card>>;

    /// Whether a card token is already in use
    async fn card_token_exists(&self, card_token: &str) -> LedgerResult<bool>;

    /// Whether a card number is already in use
    async fn card_number_exists(&self, card_number: &str) -> LedgerResult<bool>;

    /// Set card status and reason
    async fn set_card_status(
        &self,
        card_token: &str,
        status: CardStatus,
        reason: Option<String>,
    ) -> LedgerResult<()>;

    /// Set the card's limit profile reference
    async fn set_card_limit_profile(
        &self,
        card_token: &str,
        profile_id: &str,
    ) -> LedgerResult<()>;

    /// Set the card's expiry date and reissue flag
    async fn set_card_expiry(
        &self,
        card_token: &str,
        expiry: NaiveDate,
        reissue: bool,
    ) -> LedgerResult<()>;

    /// Replace the card's PIN hash
    async fn set_card_pin_hash(&self, card_token: &str, pin_hash: &str) -> LedgerResult<()>;

    /// Atomically apply a delta to the card's available balance
    async fn adjust_card_available(
        &self,
        card_token: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange>;

    /// Atomically zero the card's cashback and credit it into the available
    /// balance; returns `None` when there is nothing to redeem
    async fn redeem_card_cashback(
        &self,
        card_token: &str,
    ) -> LedgerResult<Option<CashbackRedemption>>;

    // --- limit profiles ---

    /// Save (insert or replace) a limit profile
    async fn save_limit_profile(&self, profile: &LimitProfile) -> LedgerResult<()>;

    /// Get a limit profile by id
    async fn get_limit_profile(&self, profile_id: &str) -> LedgerResult<Option<LimitProfile>>;

    /// All limit profiles
    async fn list_limit_profiles(&self) -> LedgerResult<Vec<LimitProfile>>;

    // --- transaction ledger ---

    /// Append an entry to the end of the card's transaction history
    async fn append_transaction(
        &self,
        card_token: &str,
        transaction: &Transaction,
    ) -> LedgerResult<()>;

    /// Entries whose date falls within `[from, to]` (both inclusive),
    /// in insertion order
    async fn get_card_transactions(
        &self,
        card_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>>;
}
