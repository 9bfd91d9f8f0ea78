//! Ledger engine: orchestrates every balance-affecting operation

use std::sync::Mutex;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::currency;
use crate::engine::cards::{CardRegistry, NewCardRequest};
use crate::engine::clients::ClientDirectory;
use crate::engine::history::TransactionLedger;
use crate::engine::profiles::LimitProfileCatalog;
use crate::pin;
use crate::reference::StanGenerator;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{
    format_amount, format_wire_date, format_wire_time, month_end, parse_wire_date,
    validate_date_range, validate_pin, validate_positive_amount,
};

/// Years added to the expiry on renewal
const RENEWAL_YEARS: i32 = 5;

/// Validity window of a QR withdrawal payload
const QR_EXPIRY_SECONDS: u32 = 300;

/// Ledger-append attempts before an entry is parked for reconciliation
const APPEND_ATTEMPTS: u32 = 3;

/// Payload returned once, at creation, with the raw card number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCardReceipt {
    pub card_number: String,
    pub card_token: String,
    pub expiry: NaiveDate,
}

/// Read-only projection of card fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number_masked: String,
    pub available_balance: BigDecimal,
    pub currency: String,
    pub expiry: NaiveDate,
    pub status: CardStatus,
    pub cashback: BigDecimal,
}

/// Payload of a successful balance transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Transaction reference for the ledger entry
    pub stan: String,
    /// Card available balance after the transfer
    pub new_card_balance: BigDecimal,
    pub currency: String,
}

/// Payload of a successful cashback redemption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub stan: String,
    /// Amount swept out of the cashback bucket
    pub redeemed: BigDecimal,
    /// Card available balance after the credit
    pub new_card_balance: BigDecimal,
}

/// Payload of a successful card renewal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalReceipt {
    pub expiry: NaiveDate,
}

/// Payload of a recorded QR withdrawal request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrWithdrawalReceipt {
    /// Pipe-delimited payload for the caller to encode into a QR image
    pub payload: String,
    /// How long the payload stays presentable
    pub expires_in_seconds: u32,
}

/// The orchestration core
///
/// Sole writer path to balance-affecting fields. Every operation follows the
/// same protocol: validate, resolve entities, mutate (atomically per entity,
/// with a compensating reversal when a two-entity transfer fails half-way),
/// append a ledger entry, return a structured result. The `channel_id`
/// argument on each operation is recorded for audit only.
pub struct LedgerEngine<S: LedgerStorage + Clone> {
    clients: ClientDirectory<S>,
    cards: CardRegistry<S>,
    profiles: LimitProfileCatalog<S>,
    history: TransactionLedger<S>,
    stan: StanGenerator,
    /// Entries whose balance change committed but whose ledger append kept
    /// failing; queued for reconciliation instead of being dropped
    unrecorded: Mutex<Vec<(String, Transaction)>>,
}

impl<S: LedgerStorage + Clone> LedgerEngine<S> {
    /// Create an engine over the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            clients: ClientDirectory::new(storage.clone()),
            cards: CardRegistry::new(storage.clone()),
            profiles: LimitProfileCatalog::new(storage.clone()),
            history: TransactionLedger::new(storage),
            stan: StanGenerator::new(),
            unrecorded: Mutex::new(Vec::new()),
        }
    }

    /// The client directory collaborator
    pub fn clients(&self) -> &ClientDirectory<S> {
        &self.clients
    }

    /// The limit profile catalog collaborator
    pub fn profiles(&self) -> &LimitProfileCatalog<S> {
        &self.profiles
    }

    /// Create a card for an existing client
    ///
    /// The raw card number is exposed here and nowhere else.
    pub async fn create_card(
        &self,
        channel_id: &str,
        mut request: NewCardRequest,
    ) -> LedgerResult<NewCardReceipt> {
        self.clients.require_client(&request.client_id).await?;
        request.currency = currency::normalize(&request.currency);

        // the profile reference must resolve from birth, default included
        let profile_id = request
            .limit_profile
            .clone()
            .unwrap_or_else(|| crate::engine::cards::DEFAULT_LIMIT_PROFILE.to_string());
        if self.profiles.lookup(&profile_id).await?.is_none() {
            return Err(LedgerError::Validation(format!(
                "Limit profile '{}' does not exist",
                profile_id
            )));
        }

        let card = self.cards.create_card(request).await?;
        info!(
            channel_id,
            client_id = %card.client_id,
            card_token = %card.card_token,
            "card created"
        );
        Ok(NewCardReceipt {
            card_number: card.card_number,
            card_token: card.card_token,
            expiry: card.expiry,
        })
    }

    /// Read-only projection of card fields
    pub async fn retrieve_details(
        &self,
        _channel_id: &str,
        card_token: &str,
    ) -> LedgerResult<CardDetails> {
        let card = self.cards.require_card(card_token).await?;
        Ok(CardDetails {
            card_number_masked: card.masked_number(),
            available_balance: card.available_balance,
            currency: card.currency,
            expiry: card.expiry,
            status: card.status,
            cashback: card.cashback,
        })
    }

    /// Card verification value for the given card
    pub async fn retrieve_cvv2(
        &self,
        _channel_id: &str,
        card_token: &str,
    ) -> LedgerResult<String> {
        let card = self.cards.require_card(card_token).await?;
        Ok(card.cvv2)
    }

    /// Set a new PIN; non-financial, no ledger entry
    pub async fn set_pin(
        &self,
        channel_id: &str,
        client_id: &str,
        card_token: &str,
        raw_pin: &str,
    ) -> LedgerResult<()> {
        validate_pin(raw_pin)?;
        self.clients.require_client(client_id).await?;
        self.cards.require_card(card_token).await?;
        self.cards
            .set_pin_hash(card_token, &pin::hash_pin(raw_pin))
            .await?;
        info!(channel_id, card_token, "PIN updated");
        Ok(())
    }

    /// Move funds from a client balance bucket onto the card
    pub async fn transfer_funds(
        &self,
        channel_id: &str,
        client_id: &str,
        card_token: &str,
        amount: &BigDecimal,
        currency_code: &str,
        source: FundingSource,
    ) -> LedgerResult<Outcome<TransferReceipt>> {
        validate_positive_amount(amount)?;
        let card = self.cards.require_card(card_token).await?;
        CardRegistry::<S>::require_ownership(&card, client_id)?;
        let cur = currency::normalize(currency_code);

        // conditional debit: atomic read-check-write at the storage layer
        match self.clients.debit(client_id, source, &cur, amount).await? {
            BalanceChange::Insufficient { available } => {
                info!(
                    channel_id,
                    client_id, card_token, %source, "transfer declined: insufficient funds"
                );
                return Ok(Outcome::Declined(Decline::InsufficientFunds {
                    source: source.to_string(),
                    available,
                }));
            }
            BalanceChange::Applied { .. } => {}
        }

        let new_card_balance = match self.cards.credit_available(card_token, amount).await {
            Ok(BalanceChange::Applied { new_balance }) => new_balance,
            Ok(BalanceChange::Insufficient { .. }) => {
                self.reverse_client_debit(client_id, source, &cur, amount).await;
                return Err(LedgerError::Storage(
                    "Card credit was refused by storage".to_string(),
                ));
            }
            Err(err) => {
                self.reverse_client_debit(client_id, source, &cur, amount).await;
                return Err(err);
            }
        };

        let txn_type = match source {
            FundingSource::Wallet => TransactionType::WalletToCard,
            FundingSource::Account => TransactionType::AccountToCard,
        };
        let txn = Transaction::new(
            self.stan.next_stan(),
            txn_type,
            amount.clone(),
            cur.clone(),
        );
        let stan = txn.stan.clone();
        self.record_entry(card_token, txn).await;

        info!(
            channel_id,
            client_id, card_token, %source, stan, "transfer approved"
        );
        Ok(Outcome::Approved(TransferReceipt {
            stan,
            new_card_balance,
            currency: cur,
        }))
    }

    /// Move funds from the card back to the client's wallet
    pub async fn transfer_card_to_wallet(
        &self,
        channel_id: &str,
        client_id: &str,
        card_token: &str,
        amount: &BigDecimal,
        currency_code: &str,
    ) -> LedgerResult<Outcome<TransferReceipt>> {
        validate_positive_amount(amount)?;
        let card = self.cards.require_card(card_token).await?;
        CardRegistry::<S>::require_ownership(&card, client_id)?;
        let cur = currency::normalize(currency_code);

        let new_card_balance = match self.cards.debit_available(card_token, amount).await? {
            BalanceChange::Insufficient { available } => {
                info!(
                    channel_id,
                    client_id, card_token, "transfer declined: insufficient card funds"
                );
                return Ok(Outcome::Declined(Decline::InsufficientFunds {
                    source: "card".to_string(),
                    available,
                }));
            }
            BalanceChange::Applied { new_balance } => new_balance,
        };

        if let Err(err) = self
            .clients
            .credit(client_id, FundingSource::Wallet, &cur, amount)
            .await
        {
            // reverse the committed card debit before surfacing the failure
            if let Err(reverse_err) = self.cards.credit_available(card_token, amount).await {
                error!(
                    card_token,
                    error = %reverse_err,
                    "compensating card credit failed; manual reconciliation required"
                );
            }
            return Err(err);
        }

        let txn = Transaction::new(
            self.stan.next_stan(),
            TransactionType::CardToWallet,
            amount.clone(),
            cur.clone(),
        );
        let stan = txn.stan.clone();
        self.record_entry(card_token, txn).await;

        info!(channel_id, client_id, card_token, stan, "card-to-wallet approved");
        Ok(Outcome::Approved(TransferReceipt {
            stan,
            new_card_balance,
            currency: cur,
        }))
    }

    /// Sweep accrued cashback into the card's available balance
    pub async fn redeem_points(
        &self,
        channel_id: &str,
        card_token: &str,
    ) -> LedgerResult<Outcome<RedemptionReceipt>> {
        let card = self.cards.require_card(card_token).await?;

        let Some(redemption) = self.cards.redeem_cashback(card_token).await? else {
            return Ok(Outcome::Declined(Decline::NoPointsToRedeem));
        };

        let txn = Transaction::new(
            self.stan.next_stan(),
            TransactionType::MemoCredit,
            redemption.redeemed.clone(),
            card.currency,
        );
        let stan = txn.stan.clone();
        self.record_entry(card_token, txn).await;

        info!(channel_id, card_token, stan, "cashback redeemed");
        Ok(Outcome::Approved(RedemptionReceipt {
            stan,
            redeemed: redemption.redeemed,
            new_card_balance: redemption.new_available,
        }))
    }

    /// Assign a new limit profile to the card
    ///
    /// An empty profile id is a no-op success, mirroring legacy behavior.
    pub async fn update_limit_profile(
        &self,
        channel_id: &str,
        card_token: &str,
        profile_id: &str,
    ) -> LedgerResult<Outcome<()>> {
        self.cards.require_card(card_token).await?;
        let profile_id = profile_id.trim();
        if profile_id.is_empty() {
            return Ok(Outcome::Approved(()));
        }
        if self.profiles.lookup(profile_id).await?.is_none() {
            return Ok(Outcome::Declined(Decline::ProfileNotFound {
                profile_id: profile_id.to_string(),
            }));
        }
        self.cards.set_limit_profile(card_token, profile_id).await?;
        info!(channel_id, card_token, profile_id, "limit profile updated");
        Ok(Outcome::Approved(()))
    }

    /// Change the card status, enforcing the one-directional transition table
    pub async fn update_status(
        &self,
        channel_id: &str,
        card_token: &str,
        status: CardStatus,
        reason: Option<String>,
    ) -> LedgerResult<()> {
        let card = self.cards.require_card(card_token).await?;
        if !card.status.can_transition_to(status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: card.status,
                to: status,
            });
        }
        self.cards.set_status(card_token, status, reason).await?;
        info!(channel_id, card_token, %status, "card status updated");
        Ok(())
    }

    /// Renew the expiry to month-end five years ahead and clear the reissue flag
    pub async fn renew_card(
        &self,
        channel_id: &str,
        card_token: &str,
    ) -> LedgerResult<RenewalReceipt> {
        self.cards.require_card(card_token).await?;
        let now = chrono::Utc::now().naive_utc().date();
        let expiry = month_end(now.year() + RENEWAL_YEARS, now.month())?;
        self.cards.set_expiry(card_token, expiry, false).await?;
        info!(channel_id, card_token, %expiry, "card renewed");
        Ok(RenewalReceipt { expiry })
    }

    /// Card history between two inclusive `ddmmyyyy` dates
    pub async fn transaction_history(
        &self,
        _channel_id: &str,
        card_token: &str,
        from_date: &str,
        to_date: &str,
    ) -> LedgerResult<Vec<Transaction>> {
        let from = parse_wire_date(from_date)?;
        let to = parse_wire_date(to_date)?;
        validate_date_range(from, to)?;
        self.cards.require_card(card_token).await?;
        self.history.query(card_token, from, to).await
    }

    /// Masked card listing for a client
    pub async fn list_cards(
        &self,
        _channel_id: &str,
        client_id: &str,
    ) -> LedgerResult<Vec<CardSummary>> {
        self.clients.require_client(client_id).await?;
        self.cards.list_cards(client_id).await
    }

    /// Update the client's contact mobile number
    pub async fn update_client_mobile(
        &self,
        channel_id: &str,
        client_id: &str,
        card_token: &str,
        mobile: &str,
    ) -> LedgerResult<()> {
        let card = self.cards.require_card(card_token).await?;
        CardRegistry::<S>::require_ownership(&card, client_id)?;
        self.clients.set_mobile(client_id, mobile).await?;
        info!(channel_id, client_id, "client mobile updated");
        Ok(())
    }

    /// Record a QR withdrawal request against the client with this mobile
    ///
    /// No balance moves here; the request is recorded for audit and the
    /// payload is handed back for presentation. Image encoding is left to
    /// the caller.
    pub async fn qr_code_withdrawal(
        &self,
        channel_id: &str,
        transaction_id: &str,
        amount: &BigDecimal,
        currency_code: &str,
        mobile: &str,
    ) -> LedgerResult<QrWithdrawalReceipt> {
        validate_positive_amount(amount)?;
        let cur = currency::normalize(currency_code);
        let now = chrono::Utc::now().naive_utc();
        let entry = QrWithdrawal {
            transaction_id: transaction_id.to_string(),
            amount: amount.clone(),
            currency: cur.clone(),
            created_date: now.date(),
            created_time: now.time(),
        };
        self.clients.record_qr_withdrawal(mobile, &entry).await?;

        let payload = format!(
            "{}|{}|{}|{}|{}{}",
            transaction_id,
            format_amount(amount),
            cur,
            mobile,
            format_wire_date(now.date()),
            format_wire_time(now.time()),
        );
        info!(channel_id, transaction_id, "QR withdrawal recorded");
        Ok(QrWithdrawalReceipt {
            payload,
            expires_in_seconds: QR_EXPIRY_SECONDS,
        })
    }

    /// Limit details for one profile id
    pub async fn limit_details(
        &self,
        _channel_id: &str,
        profile_id: &str,
    ) -> LedgerResult<Option<LimitProfile>> {
        self.profiles.lookup(profile_id).await
    }

    /// All limit profiles in the catalog
    pub async fn limit_profiles(&self, _channel_id: &str) -> LedgerResult<Vec<LimitProfile>> {
        self.profiles.list_all().await
    }

    /// Entries whose ledger append exhausted its retries; the balance changes
    /// behind them are already committed
    pub fn unrecorded_entries(&self) -> Vec<(String, Transaction)> {
        self.unrecorded.lock().unwrap().clone()
    }

    /// Re-attempt every parked ledger append; returns how many were recorded
    pub async fn retry_unrecorded(&self) -> usize {
        let parked = std::mem::take(&mut *self.unrecorded.lock().unwrap());
        let mut recorded = 0;
        for (card_token, txn) in parked {
            match self.history.append(&card_token, &txn).await {
                Ok(()) => recorded += 1,
                Err(err) => {
                    warn!(card_token, stan = %txn.stan, error = %err, "reconciliation append failed");
                    self.unrecorded.lock().unwrap().push((card_token, txn));
                }
            }
        }
        recorded
    }

    async fn reverse_client_debit(
        &self,
        client_id: &str,
        source: FundingSource,
        currency_code: &str,
        amount: &BigDecimal,
    ) {
        if let Err(err) = self
            .clients
            .credit(client_id, source, currency_code, amount)
            .await
        {
            error!(
                client_id,
                %source,
                error = %err,
                "compensating client credit failed; manual reconciliation required"
            );
        }
    }

    /// Append a ledger entry for a committed balance change
    ///
    /// Failure here never rolls the balance back: retry with backoff, then
    /// park the entry for reconciliation.
    async fn record_entry(&self, card_token: &str, txn: Transaction) {
        let mut delay = Duration::from_millis(50);
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.history.append(card_token, &txn).await {
                Ok(()) => return,
                Err(err) if attempt < APPEND_ATTEMPTS => {
                    warn!(
                        card_token,
                        stan = %txn.stan,
                        attempt,
                        error = %err,
                        "ledger append failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => {
                    error!(
                        card_token,
                        stan = %txn.stan,
                        error = %err,
                        "ledger append exhausted retries, parking entry for reconciliation"
                    );
                    self.unrecorded
                        .lock()
                        .unwrap()
                        .push((card_token.to_string(), txn.clone()));
                }
            }
        }
    }
}
