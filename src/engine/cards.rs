//! Card registry: card records, identity generation, single-record updates

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use uuid::Uuid;

use crate::pin;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::month_end;

/// Limit profile assigned to new cards when the caller supplies none
pub const DEFAULT_LIMIT_PROFILE: &str = "ICCSLIMIT";

/// PIN assigned to new cards until the holder sets one
const INITIAL_PIN: &str = "0000";

/// Bounded retries when a generated token or number collides
const MAX_GENERATION_ATTEMPTS: u32 = 5;

/// Identity, contact and product fields for a new card
#[derive(Debug, Clone)]
pub struct NewCardRequest {
    pub client_id: String,
    pub first_name: String,
    pub last_name: String,
    pub embossing_name: String,
    pub address: String,
    pub city: String,
    pub mobile: String,
    pub email: String,
    pub card_type: String,
    pub product_type: String,
    /// Canonical currency code (normalized by the engine)
    pub currency: String,
    /// Limit profile id; defaults to [`DEFAULT_LIMIT_PROFILE`] when `None`
    pub limit_profile: Option<String>,
}

/// Registry of card records
///
/// Owns card identity generation and every single-record card update. Each
/// update is atomic per record at the storage layer.
pub struct CardRegistry<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> CardRegistry<S> {
    /// Create a new card registry
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Get a card by token
    pub async fn get_card(&self, card_token: &str) -> LedgerResult<Option<Card>> {
        self.storage.get_card(card_token).await
    }

    /// Get a card by token, returning an error if not found
    pub async fn require_card(&self, card_token: &str) -> LedgerResult<Card> {
        self.storage
            .get_card(card_token)
            .await?
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))
    }

    /// Fail unless the card is owned by the given client
    pub fn require_ownership(card: &Card, client_id: &str) -> LedgerResult<()> {
        if card.client_id != client_id {
            return Err(LedgerError::OwnershipMismatch {
                card_token: card.card_token.clone(),
                client_id: client_id.to_string(),
            });
        }
        Ok(())
    }

    /// Create a card with generated identity, zero balances, Active status
    /// and a month-end expiry in the current month
    ///
    /// Returns the full record including the raw card number; this is the
    /// only read path that exposes it unmasked.
    pub async fn create_card(&self, request: NewCardRequest) -> LedgerResult<Card> {
        let card_token = self.unique_card_token().await?;
        let card_number = self.unique_card_number().await?;
        let now = chrono::Utc::now().naive_utc().date();
        let expiry = month_end(now.year(), now.month())?;

        let card = Card {
            card_token,
            card_number,
            client_id: request.client_id,
            status: CardStatus::Active,
            status_reason: None,
            card_type: request.card_type,
            product_type: request.product_type,
            currency: request.currency,
            limit_profile: Some(
                request
                    .limit_profile
                    .unwrap_or_else(|| DEFAULT_LIMIT_PROFILE.to_string()),
            ),
            available_balance: BigDecimal::from(0),
            current_balance: BigDecimal::from(0),
            cashback: BigDecimal::from(0),
            pin_hash: pin::hash_pin(INITIAL_PIN),
            cvv2: generate_cvv2(),
            expiry,
            reissue: false,
            holder: CardHolder {
                first_name: request.first_name,
                last_name: request.last_name,
                embossing_name: request.embossing_name,
                address: request.address,
                city: request.city,
                mobile: request.mobile,
                email: request.email,
            },
            transactions: Vec::new(),
        };

        self.storage.insert_card(&card).await?;
        Ok(card)
    }

    /// Masked summaries for every card owned by the client, in storage order
    pub async fn list_cards(&self, client_id: &str) -> LedgerResult<Vec<CardSummary>> {
        let cards = self.storage.list_cards(client_id).await?;
        Ok(cards.iter().map(CardSummary::from).collect())
    }

    /// Set card status and reason
    pub async fn set_status(
        &self,
        card_token: &str,
        status: CardStatus,
        reason: Option<String>,
    ) -> LedgerResult<()> {
        self.storage.set_card_status(card_token, status, reason).await
    }

    /// Set the card's limit profile reference
    pub async fn set_limit_profile(
        &self,
        card_token: &str,
        profile_id: &str,
    ) -> LedgerResult<()> {
        self.storage
            .set_card_limit_profile(card_token, profile_id)
            .await
    }

    /// Set the card's expiry date and reissue flag
    pub async fn set_expiry(
        &self,
        card_token: &str,
        expiry: NaiveDate,
        reissue: bool,
    ) -> LedgerResult<()> {
        self.storage.set_card_expiry(card_token, expiry, reissue).await
    }

    /// Replace the card's PIN hash
    pub async fn set_pin_hash(&self, card_token: &str, pin_hash: &str) -> LedgerResult<()> {
        self.storage.set_card_pin_hash(card_token, pin_hash).await
    }

    /// Conditionally debit the card's available balance
    pub async fn debit_available(
        &self,
        card_token: &str,
        amount: &BigDecimal,
    ) -> LedgerResult<BalanceChange> {
        self.storage
            .adjust_card_available(card_token, BalanceDelta::Debit(amount.clone()))
            .await
    }

    /// Credit the card's available balance
    pub async fn credit_available(
        &self,
        card_token: &str,
        amount: &BigDecimal,
    ) -> LedgerResult<BalanceChange> {
        self.storage
            .adjust_card_available(card_token, BalanceDelta::Credit(amount.clone()))
            .await
    }

    /// Atomically sweep cashback into the available balance
    pub async fn redeem_cashback(
        &self,
        card_token: &str,
    ) -> LedgerResult<Option<CashbackRedemption>> {
        self.storage.redeem_card_cashback(card_token).await
    }

    async fn unique_card_token(&self) -> LedgerResult<String> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let token = generate_card_token();
            if !self.storage.card_token_exists(&token).await? {
                return Ok(token);
            }
        }
        Err(LedgerError::Storage(
            "Could not generate a unique card token".to_string(),
        ))
    }

    async fn unique_card_number(&self) -> LedgerResult<String> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let number = generate_card_number();
            if !self.storage.card_number_exists(&number).await? {
                return Ok(number);
            }
        }
        Err(LedgerError::Storage(
            "Could not generate a unique card number".to_string(),
        ))
    }
}

/// Opaque token: "?A" followed by 14 uppercase hex characters
fn generate_card_token() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("?A{}", &hex[..14])
}

/// 16-digit display number in the 5xxx range
fn generate_card_number() -> String {
    let tail: u64 = rand::thread_rng().gen_range(0..1_000_000_000_000_000);
    format!("{}", 5_000_000_000_000_000u64 + tail)
}

/// Three-digit card verification value
fn generate_cvv2() -> String {
    format!("{:03}", rand::thread_rng().gen_range(0..1000u32))
}
