//! Core types and data structures for the card ledger system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Card lifecycle status
///
/// Transitions are one-directional: a card can be blocked or stopped but
/// never reinstated through this engine. `Blocked` may still escalate to
/// `Stopped`. Setting the current status again is treated as an idempotent
/// refresh (the reason may change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    /// Card is usable
    Active,
    /// Card is temporarily blocked
    Blocked,
    /// Card is permanently stopped
    Stopped,
}

impl CardStatus {
    /// Single-letter status code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            CardStatus::Active => "A",
            CardStatus::Blocked => "B",
            CardStatus::Stopped => "S",
        }
    }

    /// Parse a single-letter status code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "A" => Some(CardStatus::Active),
            "B" => Some(CardStatus::Blocked),
            "S" => Some(CardStatus::Stopped),
            _ => None,
        }
    }

    /// Whether a transition from `self` to `to` is permitted
    pub fn can_transition_to(&self, to: CardStatus) -> bool {
        if *self == to {
            return true;
        }
        matches!(
            (self, to),
            (CardStatus::Active, CardStatus::Blocked)
                | (CardStatus::Active, CardStatus::Stopped)
                | (CardStatus::Blocked, CardStatus::Stopped)
        )
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardStatus::Active => "Active",
            CardStatus::Blocked => "Blocked",
            CardStatus::Stopped => "Stopped",
        };
        write!(f, "{}", name)
    }
}

/// Which client balance bucket funds a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundingSource {
    /// The client's e-wallet balance
    Wallet,
    /// The client's bank account balance
    Account,
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingSource::Wallet => write!(f, "wallet"),
            FundingSource::Account => write!(f, "account"),
        }
    }
}

/// A client who owns wallets, accounts and cards
///
/// Balances are keyed by canonical currency code and are never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub client_id: String,
    /// E-wallet balances per currency
    pub wallets: HashMap<String, BigDecimal>,
    /// Bank account balances per currency
    pub accounts: HashMap<String, BigDecimal>,
    /// Contact mobile number
    pub mobile: String,
    /// Contact e-mail address
    pub email: String,
    /// Withdrawal requests raised via QR, recorded for audit
    pub qr_withdrawals: Vec<QrWithdrawal>,
}

impl Client {
    /// Create a new client with no balances
    pub fn new(client_id: String, mobile: String, email: String) -> Self {
        Self {
            client_id,
            wallets: HashMap::new(),
            accounts: HashMap::new(),
            mobile,
            email,
            qr_withdrawals: Vec::new(),
        }
    }

    /// Balance for the given bucket and currency; unknown currency reads 0
    pub fn balance(&self, source: FundingSource, currency: &str) -> BigDecimal {
        let bucket = match source {
            FundingSource::Wallet => &self.wallets,
            FundingSource::Account => &self.accounts,
        };
        bucket.get(currency).cloned().unwrap_or_else(|| BigDecimal::from(0))
    }
}

/// A QR withdrawal request recorded against a client
///
/// Only the request is recorded here; no balance moves until the withdrawal
/// is presented and settled through an external acquirer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrWithdrawal {
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub created_date: NaiveDate,
    pub created_time: NaiveTime,
}

/// Cardholder identity and contact fields captured at card creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardHolder {
    pub first_name: String,
    pub last_name: String,
    /// Name embossed on the plastic
    pub embossing_name: String,
    pub address: String,
    pub city: String,
    pub mobile: String,
    pub email: String,
}

/// A card record, owned by exactly one client for its whole life
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque unique identifier used in every operation
    pub card_token: String,
    /// 16-digit display number; masked on every read path except creation
    pub card_number: String,
    /// Owning client; never changes after creation
    pub client_id: String,
    pub status: CardStatus,
    /// Free-text reason recorded with the latest status change
    pub status_reason: Option<String>,
    /// e.g. "DEBIT"
    pub card_type: String,
    /// e.g. "CLASSIC"
    pub product_type: String,
    /// Canonical currency code, fixed at creation
    pub currency: String,
    /// Reference into the limit profile catalog
    pub limit_profile: Option<String>,
    /// Spendable balance
    pub available_balance: BigDecimal,
    /// Statement balance, tracked independently of the spendable balance
    pub current_balance: BigDecimal,
    /// Accrued rewards, convertible into available balance
    pub cashback: BigDecimal,
    /// Salted one-way hash of the PIN
    pub pin_hash: String,
    /// Three-digit card verification value
    pub cvv2: String,
    /// Expiry date (always a month-end)
    pub expiry: NaiveDate,
    /// Set when the card is due for reissue; cleared on renewal
    pub reissue: bool,
    pub holder: CardHolder,
    /// Append-only completed-operation history
    pub transactions: Vec<Transaction>,
}

impl Card {
    /// Display form exposing only the last four digits
    pub fn masked_number(&self) -> String {
        mask_card_number(&self.card_number)
    }

    /// Last four digits of the card number
    pub fn last4(&self) -> String {
        let n = self.card_number.len().saturating_sub(4);
        self.card_number[n..].to_string()
    }
}

/// Mask a card number down to its last four digits
pub fn mask_card_number(number: &str) -> String {
    if number.is_empty() {
        return String::new();
    }
    let n = number.len().saturating_sub(4);
    format!("**** **** **** {}", &number[n..])
}

/// Masked projection of a card for client-facing listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card_token: String,
    pub card_number_masked: String,
    pub last4: String,
    pub status: CardStatus,
    pub card_type: String,
    pub product_type: String,
    pub currency: String,
    pub expiry: NaiveDate,
    pub available_balance: BigDecimal,
    pub limit_profile: Option<String>,
}

impl From<&Card> for CardSummary {
    fn from(card: &Card) -> Self {
        Self {
            card_token: card.card_token.clone(),
            card_number_masked: card.masked_number(),
            last4: card.last4(),
            status: card.status,
            card_type: card.card_type.clone(),
            product_type: card.product_type.clone(),
            currency: card.currency.clone(),
            expiry: card.expiry,
            available_balance: card.available_balance.clone(),
            limit_profile: card.limit_profile.clone(),
        }
    }
}

/// Enumerated transaction-type codes recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Wallet funds moved onto a card
    WalletToCard,
    /// Bank account funds moved onto a card
    AccountToCard,
    /// Card funds moved back to the wallet
    CardToWallet,
    /// Cashback redemption credited to the card
    MemoCredit,
}

impl TransactionType {
    /// Wire code for the transaction type
    pub fn code(&self) -> &'static str {
        match self {
            TransactionType::WalletToCard => "WC",
            TransactionType::AccountToCard => "AC",
            TransactionType::CardToWallet => "CW",
            TransactionType::MemoCredit => "23",
        }
    }

    /// Human-readable description recorded with each entry
    pub fn description(&self) -> &'static str {
        match self {
            TransactionType::WalletToCard => "WALLET TO CARD",
            TransactionType::AccountToCard => "ACCOUNT TO CARD",
            TransactionType::CardToWallet => "CARD TO WALLET",
            TransactionType::MemoCredit => "MEMO-CREDIT ADJUSTMENT",
        }
    }

    /// Terminal-location label recorded with each entry
    pub fn terminal_location(&self) -> &'static str {
        match self {
            TransactionType::WalletToCard => "PAYMENT FROM WALLET TO CARD",
            TransactionType::AccountToCard => "ACCOUNT TO CARD",
            TransactionType::CardToWallet => "PAYMENT FROM CARD TO WALLET",
            TransactionType::MemoCredit => "Redeem Points",
        }
    }
}

/// Posting status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    PendingAuthorization,
    Posted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::PendingAuthorization => write!(f, "Pending Authorization"),
            TransactionStatus::Posted => write!(f, "Posted"),
        }
    }
}

/// A single completed operation in a card's history
///
/// Immutable once appended; never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// System Trace Audit Number, unique per issued transaction
    pub stan: String,
    pub txn_type: TransactionType,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    /// Descriptive terminal-location label
    pub terminal_location: String,
    pub description: String,
}

impl Transaction {
    /// Create an entry dated now (UTC) in pending-authorization status
    pub fn new(
        stan: String,
        txn_type: TransactionType,
        amount: BigDecimal,
        currency: String,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            date: now.date(),
            time: now.time(),
            stan,
            txn_type,
            amount,
            currency,
            status: TransactionStatus::PendingAuthorization,
            terminal_location: txn_type.terminal_location().to_string(),
            description: txn_type.description().to_string(),
        }
    }
}

/// A named limit policy capping transaction counts/amounts per window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitProfile {
    /// Profile identifier referenced from card records
    pub id: String,
    pub currency: String,
    /// Limit class tag
    pub class_tag: String,
    pub amount_weekly: BigDecimal,
    pub amount_monthly: BigDecimal,
    pub txn_count_weekly: u32,
    pub txn_count_monthly: u32,
}

/// Result of an operation that can be declined as a normal business outcome
///
/// Declines are values, not errors: callers must branch on them
/// programmatically. Hard failures travel through [`LedgerError`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// Operation applied; payload carries the operation-specific result
    Approved(T),
    /// Operation refused without any state change
    Declined(Decline),
}

impl<T> Outcome<T> {
    /// Coarse response code for the two-part wire result
    pub fn code(&self) -> &'static str {
        match self {
            Outcome::Approved(_) => "000",
            Outcome::Declined(decline) => decline.code(),
        }
    }

    /// Human-readable description for the two-part wire result
    pub fn description(&self) -> String {
        match self {
            Outcome::Approved(_) => "Success".to_string(),
            Outcome::Declined(decline) => decline.to_string(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Outcome::Approved(_))
    }
}

/// Expected business declines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decline {
    InsufficientFunds {
        source: String,
        available: BigDecimal,
    },
    NoPointsToRedeem,
    ProfileNotFound { profile_id: String },
}

// Manual Display/Error impls: thiserror's derive would treat the
// `source` field as an error source, which `String` cannot be.
impl std::fmt::Display for Decline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decline::InsufficientFunds { source, .. } => {
                write!(f, "Insufficient {source} funds")
            }
            Decline::NoPointsToRedeem => write!(f, "No points to redeem"),
            Decline::ProfileNotFound { .. } => write!(f, "Limit profile not found"),
        }
    }
}

impl std::error::Error for Decline {}

impl Decline {
    /// Coarse response code for the decline
    pub fn code(&self) -> &'static str {
        match self {
            Decline::InsufficientFunds { .. } => "051",
            Decline::NoPointsToRedeem => "340",
            Decline::ProfileNotFound { .. } => "404",
        }
    }
}

/// Errors that can occur in the card ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Client not found: {0}")]
    ClientNotFound(String),
    #[error("Card not found: {0}")]
    CardNotFound(String),
    #[error("Card {card_token} does not belong to client {client_id}")]
    OwnershipMismatch {
        card_token: String,
        client_id: String,
    },
    #[error("Status transition {from} -> {to} is not permitted")]
    InvalidStatusTransition { from: CardStatus, to: CardStatus },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
