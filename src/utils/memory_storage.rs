//! In-memory storage implementation for testing and development
//!
//! A single lock guards the whole store, which trivially satisfies the
//! atomicity the engine requires: conditional debits are read-check-write
//! under the write lock, and per-card history appends cannot interleave.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Store {
    clients: HashMap<String, Client>,
    cards: HashMap<String, Card>,
    profiles: HashMap<String, LimitProfile>,
}

/// In-memory [`LedgerStorage`] implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<Store>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        let mut store = self.store.write().unwrap();
        store.clients.clear();
        store.cards.clear();
        store.profiles.clear();
    }
}

fn apply_delta(balance: &BigDecimal, delta: &BalanceDelta) -> BalanceChange {
    match delta {
        BalanceDelta::Credit(amount) => BalanceChange::Applied {
            new_balance: balance + amount,
        },
        BalanceDelta::Debit(amount) => {
            if balance < amount {
                BalanceChange::Insufficient {
                    available: balance.clone(),
                }
            } else {
                BalanceChange::Applied {
                    new_balance: balance - amount,
                }
            }
        }
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_client(&self, client: &Client) -> LedgerResult<()> {
        self.store
            .write()
            .unwrap()
            .clients
            .insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> LedgerResult<Option<Client>> {
        Ok(self.store.read().unwrap().clients.get(client_id).cloned())
    }

    async fn set_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let client = store
            .clients
            .get_mut(client_id)
            .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))?;
        let bucket = match source {
            FundingSource::Wallet => &mut client.wallets,
            FundingSource::Account => &mut client.accounts,
        };
        bucket.insert(currency.to_string(), balance);
        Ok(())
    }

    async fn adjust_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange> {
        let mut store = self.store.write().unwrap();
        let client = store
            .clients
            .get_mut(client_id)
            .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))?;
        let bucket = match source {
            FundingSource::Wallet => &mut client.wallets,
            FundingSource::Account => &mut client.accounts,
        };
        let current = bucket
            .get(currency)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0));
        let change = apply_delta(&current, &delta);
        if let BalanceChange::Applied { new_balance } = &change {
            bucket.insert(currency.to_string(), new_balance.clone());
        }
        Ok(change)
    }

    async fn set_client_mobile(&self, client_id: &str, mobile: &str) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let client = store
            .clients
            .get_mut(client_id)
            .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))?;
        client.mobile = mobile.to_string();
        Ok(())
    }

    async fn append_qr_withdrawal(
        &self,
        mobile: &str,
        entry: &QrWithdrawal,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let client = store
            .clients
            .values_mut()
            .find(|client| client.mobile == mobile)
            .ok_or_else(|| LedgerError::ClientNotFound(format!("mobile {mobile}")))?;
        client.qr_withdrawals.push(entry.clone());
        Ok(())
    }

    async fn insert_card(&self, card: &Card) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        if store.cards.contains_key(&card.card_token) {
            return Err(LedgerError::Storage(format!(
                "Card token '{}' already exists",
                card.card_token
            )));
        }
        store.cards.insert(card.card_token.clone(), card.clone());
        Ok(())
    }

    async fn get_card(&self, card_token: &str) -> LedgerResult<Option<Card>> {
        Ok(self.store.read().unwrap().cards.get(card_token).cloned())
    }

    async fn list_cards(&self, client_id: &str) -> LedgerResult<Vec<Card>> {
        let store = self.store.read().unwrap();
        Ok(store
            .cards
            .values()
            .filter(|card| card.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn card_token_exists(&self, card_token: &str) -> LedgerResult<bool> {
        Ok(self.store.read().unwrap().cards.contains_key(card_token))
    }

    async fn card_number_exists(&self, card_number: &str) -> LedgerResult<bool> {
        let store = self.store.read().unwrap();
        Ok(store
            .cards
            .values()
            .any(|card| card.card_number == card_number))
    }

    async fn set_card_status(
        &self,
        card_token: &str,
        status: CardStatus,
        reason: Option<String>,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        card.status = status;
        card.status_reason = reason;
        Ok(())
    }

    async fn set_card_limit_profile(
        &self,
        card_token: &str,
        profile_id: &str,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        card.limit_profile = Some(profile_id.to_string());
        Ok(())
    }

    async fn set_card_expiry(
        &self,
        card_token: &str,
        expiry: NaiveDate,
        reissue: bool,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        card.expiry = expiry;
        card.reissue = reissue;
        Ok(())
    }

    async fn set_card_pin_hash(&self, card_token: &str, pin_hash: &str) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        card.pin_hash = pin_hash.to_string();
        Ok(())
    }

    async fn adjust_card_available(
        &self,
        card_token: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        let change = apply_delta(&card.available_balance, &delta);
        if let BalanceChange::Applied { new_balance } = &change {
            card.available_balance = new_balance.clone();
        }
        Ok(change)
    }

    async fn redeem_card_cashback(
        &self,
        card_token: &str,
    ) -> LedgerResult<Option<CashbackRedemption>> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        if card.cashback <= BigDecimal::from(0) {
            return Ok(None);
        }
        let redeemed = std::mem::replace(&mut card.cashback, BigDecimal::from(0));
        card.available_balance = &card.available_balance + &redeemed;
        Ok(Some(CashbackRedemption {
            redeemed,
            new_available: card.available_balance.clone(),
        }))
    }

    async fn save_limit_profile(&self, profile: &LimitProfile) -> LedgerResult<()> {
        self.store
            .write()
            .unwrap()
            .profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn get_limit_profile(&self, profile_id: &str) -> LedgerResult<Option<LimitProfile>> {
        Ok(self.store.read().unwrap().profiles.get(profile_id).cloned())
    }

    async fn list_limit_profiles(&self) -> LedgerResult<Vec<LimitProfile>> {
        Ok(self.store.read().unwrap().profiles.values().cloned().collect())
    }

    async fn append_transaction(
        &self,
        card_token: &str,
        transaction: &Transaction,
    ) -> LedgerResult<()> {
        let mut store = self.store.write().unwrap();
        let card = store
            .cards
            .get_mut(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        card.transactions.push(transaction.clone());
        Ok(())
    }

    async fn get_card_transactions(
        &self,
        card_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        let store = self.store.read().unwrap();
        let card = store
            .cards
            .get(card_token)
            .ok_or_else(|| LedgerError::CardNotFound(card_token.to_string()))?;
        Ok(card
            .transactions
            .iter()
            .filter(|txn| txn.date >= from && txn.date <= to)
            .cloned()
            .collect())
    }
}
