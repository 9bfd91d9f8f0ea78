//! Integration tests for card-ledger-core

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use card_ledger_core::{
    utils::validation::{format_amount, format_wire_date},
    BalanceChange, BalanceDelta, Card, CardStatus, CashbackRedemption, Client, Decline,
    FundingSource, LedgerEngine, LedgerError, LedgerResult, LedgerStorage, LimitProfile,
    MemoryStorage, NewCardRequest, Outcome, QrWithdrawal, Transaction, TransactionType,
};
use chrono::NaiveDate;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn card_request(client_id: &str) -> NewCardRequest {
    NewCardRequest {
        client_id: client_id.into(),
        first_name: "Nadia".into(),
        last_name: "Karam".into(),
        embossing_name: "NADIA KARAM".into(),
        address: "12 Hamra St".into(),
        city: "Beirut".into(),
        mobile: "70123456".into(),
        email: "nadia@example.com".into(),
        card_type: "DEBIT".into(),
        product_type: "CLASSIC".into(),
        currency: "840".into(),
        limit_profile: None,
    }
}

async fn seed_client<S: LedgerStorage>(storage: &S, client_id: &str, wallet: &str, account: &str) {
    let mut client = Client::new(client_id.into(), "70123456".into(), "c@example.com".into());
    client.wallets.insert("840".into(), dec(wallet));
    client.accounts.insert("840".into(), dec(account));
    storage.save_client(&client).await.unwrap();
}

async fn seed_default_profile<S: LedgerStorage + Clone>(engine: &LedgerEngine<S>) {
    engine
        .profiles()
        .save(&LimitProfile {
            id: "ICCSLIMIT".into(),
            currency: "840".into(),
            class_tag: "STANDARD".into(),
            amount_weekly: BigDecimal::from(5000),
            amount_monthly: BigDecimal::from(20000),
            txn_count_weekly: 50,
            txn_count_monthly: 200,
        })
        .await
        .unwrap();
}

/// Engine over a client `1001` with wallet 150.00 / account 500.00 in 840,
/// plus one freshly created card
async fn standard_setup() -> (LedgerEngine<MemoryStorage>, String) {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "150.00", "500.00").await;
    let engine = LedgerEngine::new(storage);
    seed_default_profile(&engine).await;
    let receipt = engine.create_card("test", card_request("1001")).await.unwrap();
    (engine, receipt.card_token)
}

/// Storage wrapper whose ledger appends and card credits can be switched to
/// fail, for exercising the durability and reversal paths
#[derive(Clone)]
struct FaultyStorage {
    inner: MemoryStorage,
    fail_appends: Arc<AtomicBool>,
    fail_card_credits: Arc<AtomicBool>,
}

impl FaultyStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            fail_appends: Arc::new(AtomicBool::new(false)),
            fail_card_credits: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl LedgerStorage for FaultyStorage {
    async fn save_client(&self, client: &Client) -> LedgerResult<()> {
        self.inner.save_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> LedgerResult<Option<Client>> {
        self.inner.get_client(client_id).await
    }

    async fn set_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        self.inner
            .set_client_balance(client_id, source, currency, balance)
            .await
    }

    async fn adjust_client_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange> {
        self.inner
            .adjust_client_balance(client_id, source, currency, delta)
            .await
    }

    async fn set_client_mobile(&self, client_id: &str, mobile: &str) -> LedgerResult<()> {
        self.inner.set_client_mobile(client_id, mobile).await
    }

    async fn append_qr_withdrawal(&self, mobile: &str, entry: &QrWithdrawal) -> LedgerResult<()> {
        self.inner.append_qr_withdrawal(mobile, entry).await
    }

    async fn insert_card(&self, card: &Card) -> LedgerResult<()> {
        self.inner.insert_card(card).await
    }

    async fn get_card(&self, card_token: &str) -> LedgerResult<Option<Card>> {
        self.inner.get_card(card_token).await
    }

    async fn list_cards(&self, client_id: &str) -> LedgerResult<Vec<Card>> {
        self.inner.list_cards(client_id).await
    }

    async fn card_token_exists(&self, card_token: &str) -> LedgerResult<bool> {
        self.inner.card_token_exists(card_token).await
    }

    async fn card_number_exists(&self, card_number: &str) -> LedgerResult<bool> {
        self.inner.card_number_exists(card_number).await
    }

    async fn set_card_status(
        &self,
        card_token: &str,
        status: CardStatus,
        reason: Option<String>,
    ) -> LedgerResult<()> {
        self.inner.set_card_status(card_token, status, reason).await
    }

    async fn set_card_limit_profile(&self, card_token: &str, profile_id: &str) -> LedgerResult<()> {
        self.inner.set_card_limit_profile(card_token, profile_id).await
    }

    async fn set_card_expiry(
        &self,
        card_token: &str,
        expiry: NaiveDate,
        reissue: bool,
    ) -> LedgerResult<()> {
        self.inner.set_card_expiry(card_token, expiry, reissue).await
    }

    async fn set_card_pin_hash(&self, card_token: &str, pin_hash: &str) -> LedgerResult<()> {
        self.inner.set_card_pin_hash(card_token, pin_hash).await
    }

    async fn adjust_card_available(
        &self,
        card_token: &str,
        delta: BalanceDelta,
    ) -> LedgerResult<BalanceChange> {
        if self.fail_card_credits.load(Ordering::Relaxed)
            && matches!(delta, BalanceDelta::Credit(_))
        {
            return Err(LedgerError::Storage("card write refused".into()));
        }
        self.inner.adjust_card_available(card_token, delta).await
    }

    async fn redeem_card_cashback(
        &self,
        card_token: &str,
    ) -> LedgerResult<Option<CashbackRedemption>> {
        self.inner.redeem_card_cashback(card_token).await
    }

    async fn save_limit_profile(&self, profile: &LimitProfile) -> LedgerResult<()> {
        self.inner.save_limit_profile(profile).await
    }

    async fn get_limit_profile(&self, profile_id: &str) -> LedgerResult<Option<LimitProfile>> {
        self.inner.get_limit_profile(profile_id).await
    }

    async fn list_limit_profiles(&self) -> LedgerResult<Vec<LimitProfile>> {
        self.inner.list_limit_profiles().await
    }

    async fn append_transaction(
        &self,
        card_token: &str,
        transaction: &Transaction,
    ) -> LedgerResult<()> {
        if self.fail_appends.load(Ordering::Relaxed) {
            return Err(LedgerError::Storage("append refused".into()));
        }
        self.inner.append_transaction(card_token, transaction).await
    }

    async fn get_card_transactions(
        &self,
        card_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        self.inner.get_card_transactions(card_token, from, to).await
    }
}

#[tokio::test]
async fn example_scenario_from_the_card_program() {
    let (engine, token) = standard_setup().await;

    // wallet 150.00, card 0.00: a 100.00 transfer approves
    let outcome = engine
        .transfer_funds("chn1", "1001", &token, &dec("100.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();
    let Outcome::Approved(receipt) = outcome else {
        panic!("expected approval")
    };
    assert_eq!(format_amount(&receipt.new_card_balance), "100.00");
    assert_eq!(
        format_amount(&engine.clients().wallet_balance("1001", "840").await.unwrap()),
        "50.00"
    );

    // exactly one new ledger entry of type wallet-to-card for 100.00
    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].txn_type, TransactionType::WalletToCard);
    assert_eq!(history[0].amount, dec("100.00"));
    assert_eq!(history[0].currency, "840");
    assert_eq!(history[0].stan, receipt.stan);

    // the same transfer again declines and changes nothing
    let outcome = engine
        .transfer_funds("chn1", "1001", &token, &dec("100.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Declined(Decline::InsufficientFunds { .. })
    ));
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("50.00")
    );
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1, "declines never append ledger entries");
}

#[tokio::test]
async fn account_transfers_and_alphabetic_currency_codes() {
    let (engine, token) = standard_setup().await;

    // "USD" normalizes to the canonical 840 bucket
    let outcome = engine
        .transfer_funds("chn1", "1001", &token, &dec("200.00"), "USD", FundingSource::Account)
        .await
        .unwrap();
    assert!(outcome.is_approved());
    assert_eq!(
        engine.clients().account_balance("1001", "840").await.unwrap(),
        dec("300.00")
    );

    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].txn_type, TransactionType::AccountToCard);
}

#[tokio::test]
async fn card_to_wallet_round_trip_conserves_money() {
    let (engine, token) = standard_setup().await;
    engine
        .transfer_funds("chn1", "1001", &token, &dec("120.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();

    let outcome = engine
        .transfer_card_to_wallet("chn1", "1001", &token, &dec("70.00"), "840")
        .await
        .unwrap();
    let Outcome::Approved(receipt) = outcome else {
        panic!("expected approval")
    };
    assert_eq!(receipt.new_card_balance, dec("50.00"));
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("100.00")
    );

    // over-withdrawal from the card declines with the card balance intact
    let outcome = engine
        .transfer_card_to_wallet("chn1", "1001", &token, &dec("60.00"), "840")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Declined(Decline::InsufficientFunds {
            source: "card".into(),
            available: dec("50.00"),
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_distribute_exactly_the_available_funds() {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "100.00", "0.00").await;
    let engine = Arc::new(LedgerEngine::new(storage));
    seed_default_profile(&engine).await;
    let token = engine
        .create_card("test", card_request("1001"))
        .await
        .unwrap()
        .card_token;

    // 20 tasks each try to move 10.00 out of a 100.00 wallet
    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            engine
                .transfer_funds("chn1", "1001", &token, &dec("10.00"), "840", FundingSource::Wallet)
                .await
                .unwrap()
        }));
    }

    let mut approved = 0;
    let mut declined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Outcome::Approved(_) => approved += 1,
            Outcome::Declined(Decline::InsufficientFunds { .. }) => declined += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(approved, 10, "exactly the available funds are distributed");
    assert_eq!(declined, 10);
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("0.00")
    );
    let details = engine.retrieve_details("chn1", &token).await.unwrap();
    assert_eq!(details.available_balance, dec("100.00"));

    // ledger completeness: one entry per approved transfer, none lost
    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 10);
    let mut stans: Vec<_> = history.iter().map(|t| t.stan.clone()).collect();
    stans.sort();
    stans.dedup();
    assert_eq!(stans.len(), 10, "references are unique");
}

#[tokio::test]
async fn ownership_is_enforced_before_any_mutation() {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "150.00", "0.00").await;
    seed_client(&storage, "2002", "80.00", "0.00").await;
    let engine = LedgerEngine::new(storage);
    seed_default_profile(&engine).await;
    let token = engine
        .create_card("test", card_request("1001"))
        .await
        .unwrap()
        .card_token;

    let err = engine
        .transfer_funds("chn1", "2002", &token, &dec("10.00"), "840", FundingSource::Wallet)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OwnershipMismatch { .. }));
    assert_eq!(
        engine.clients().wallet_balance("2002", "840").await.unwrap(),
        dec("80.00")
    );
    let details = engine.retrieve_details("chn1", &token).await.unwrap();
    assert_eq!(details.available_balance, dec("0"));
}

#[tokio::test]
async fn redeeming_points_moves_cashback_once() {
    let (engine, token) = standard_setup().await;

    // nothing accrued yet
    let outcome = engine.redeem_points("chn1", &token).await.unwrap();
    assert_eq!(outcome, Outcome::Declined(Decline::NoPointsToRedeem));

    // cashback accrual is an external process; seed a card that has some
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "0.00", "0.00").await;
    let seeded_card = {
        let registry_engine = LedgerEngine::new(storage.clone());
        seed_default_profile(&registry_engine).await;
        let token = registry_engine
            .create_card("test", card_request("1001"))
            .await
            .unwrap()
            .card_token;
        let mut card: Card = storage.get_card(&token).await.unwrap().unwrap();
        storage.clear();
        seed_client(&storage, "1001", "0.00", "0.00").await;
        card.cashback = dec("12.50");
        card.available_balance = dec("5.00");
        storage.insert_card(&card).await.unwrap();
        card
    };
    let engine = LedgerEngine::new(storage);
    seed_default_profile(&engine).await;

    let outcome = engine
        .redeem_points("chn1", &seeded_card.card_token)
        .await
        .unwrap();
    let Outcome::Approved(receipt) = outcome else {
        panic!("expected approval")
    };
    assert_eq!(receipt.redeemed, dec("12.50"));
    assert_eq!(receipt.new_card_balance, dec("17.50"));

    let details = engine
        .retrieve_details("chn1", &seeded_card.card_token)
        .await
        .unwrap();
    assert_eq!(details.cashback, dec("0"));
    assert_eq!(details.available_balance, dec("17.50"));

    // a second redemption finds nothing
    let outcome = engine
        .redeem_points("chn1", &seeded_card.card_token)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Declined(Decline::NoPointsToRedeem));

    // the memo-credit entry landed in the ledger
    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &seeded_card.card_token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].txn_type, TransactionType::MemoCredit);
    assert_eq!(history[0].amount, dec("12.50"));
}

#[tokio::test]
async fn lookups_are_idempotent() {
    let (engine, token) = standard_setup().await;
    engine
        .transfer_funds("chn1", "1001", &token, &dec("25.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();

    let first = engine.retrieve_details("chn1", &token).await.unwrap();
    let second = engine.retrieve_details("chn1", &token).await.unwrap();
    assert_eq!(first, second);

    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let h1 = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    let h2 = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(h1, h2);
}

#[tokio::test]
async fn pin_lifecycle() {
    let (engine, token) = standard_setup().await;

    engine.set_pin("chn1", "1001", &token, "4321").await.unwrap();

    let err = engine
        .set_pin("chn1", "1001", &token, "12ab")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = engine
        .set_pin("chn1", "9999", &token, "4321")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ClientNotFound(_)));

    let err = engine
        .set_pin("chn1", "1001", "?Amissing", "4321")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CardNotFound(_)));
}

#[tokio::test]
async fn renewal_extends_expiry_five_years_and_clears_reissue() {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "0.00", "0.00").await;
    let engine = LedgerEngine::new(storage.clone());
    seed_default_profile(&engine).await;
    let token = engine
        .create_card("test", card_request("1001"))
        .await
        .unwrap()
        .card_token;

    // card comes due for reissue
    let before = storage.get_card(&token).await.unwrap().unwrap().expiry;
    storage.set_card_expiry(&token, before, true).await.unwrap();

    let receipt = engine.renew_card("chn1", &token).await.unwrap();
    use chrono::Datelike;
    assert_eq!(receipt.expiry.year(), before.year() + 5);
    assert_eq!(receipt.expiry.month(), before.month());

    let card = storage.get_card(&token).await.unwrap().unwrap();
    assert_eq!(card.expiry, receipt.expiry);
    assert!(!card.reissue, "renewal clears the reissue flag");
}

#[tokio::test]
async fn listing_masks_and_scopes_by_client() {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "0.00", "0.00").await;
    seed_client(&storage, "2002", "0.00", "0.00").await;
    let engine = LedgerEngine::new(storage);
    seed_default_profile(&engine).await;

    let a = engine.create_card("test", card_request("1001")).await.unwrap();
    let b = engine.create_card("test", card_request("1001")).await.unwrap();
    engine.create_card("test", card_request("2002")).await.unwrap();

    let summaries = engine.list_cards("chn1", "1001").await.unwrap();
    assert_eq!(summaries.len(), 2);
    for summary in &summaries {
        assert!(summary.card_number_masked.starts_with("**** **** **** "));
        assert_eq!(summary.last4.len(), 4);
        assert!([a.card_token.as_str(), b.card_token.as_str()]
            .contains(&summary.card_token.as_str()));
    }

    let err = engine.list_cards("chn1", "9999").await.unwrap_err();
    assert!(matches!(err, LedgerError::ClientNotFound(_)));
}

#[tokio::test]
async fn unknown_entities_surface_not_found() {
    let (engine, _token) = standard_setup().await;

    let err = engine.retrieve_details("chn1", "?Anope").await.unwrap_err();
    assert!(matches!(err, LedgerError::CardNotFound(_)));

    let err = engine
        .create_card("chn1", card_request("9999"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ClientNotFound(_)));

    let err = engine.renew_card("chn1", "?Anope").await.unwrap_err();
    assert!(matches!(err, LedgerError::CardNotFound(_)));
}

#[tokio::test]
async fn records_serialize_for_transport() {
    let (engine, token) = standard_setup().await;
    engine
        .transfer_funds("chn1", "1001", &token, &dec("10.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();

    let details = engine.retrieve_details("chn1", &token).await.unwrap();
    let json = serde_json::to_string(&details).unwrap();
    let parsed: card_ledger_core::CardDetails = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, details);

    assert_eq!(details.status, CardStatus::Active);
    assert_eq!(format_amount(&details.available_balance), "10.00");
}

#[tokio::test]
async fn cvv2_mobile_and_limit_catalog_reads() {
    let (engine, token) = standard_setup().await;

    let cvv = engine.retrieve_cvv2("chn1", &token).await.unwrap();
    assert_eq!(cvv.len(), 3);
    assert!(cvv.chars().all(|c| c.is_ascii_digit()));

    engine
        .update_client_mobile("chn1", "1001", &token, "71999888")
        .await
        .unwrap();
    let err = engine
        .update_client_mobile("chn1", "2002", &token, "71999888")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OwnershipMismatch { .. }));

    let profile = engine.limit_details("chn1", "ICCSLIMIT").await.unwrap();
    assert!(profile.is_some());
    assert!(engine.limit_details("chn1", "NOPE").await.unwrap().is_none());
    assert_eq!(engine.limit_profiles("chn1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_unrecorded_entries_on_the_happy_path() {
    let (engine, token) = standard_setup().await;
    engine
        .transfer_funds("chn1", "1001", &token, &dec("10.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();
    assert!(engine.unrecorded_entries().is_empty());
    assert_eq!(engine.retry_unrecorded().await, 0);
}

#[tokio::test]
async fn failed_appends_park_entries_until_storage_recovers() {
    let storage = FaultyStorage::new();
    seed_client(&storage, "1001", "150.00", "0.00").await;
    let engine = LedgerEngine::new(storage.clone());
    seed_default_profile(&engine).await;
    let token = engine
        .create_card("test", card_request("1001"))
        .await
        .unwrap()
        .card_token;

    storage.fail_appends.store(true, Ordering::Relaxed);
    let outcome = engine
        .transfer_funds("chn1", "1001", &token, &dec("40.00"), "840", FundingSource::Wallet)
        .await
        .unwrap();

    // the balance change stands even though the append kept failing
    let Outcome::Approved(receipt) = outcome else {
        panic!("expected approval")
    };
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("110.00")
    );
    let details = engine.retrieve_details("chn1", &token).await.unwrap();
    assert_eq!(details.available_balance, dec("40.00"));

    // the entry is parked, not dropped, and the ledger has no trace yet
    let parked = engine.unrecorded_entries();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].0, token);
    assert_eq!(parked[0].1.stan, receipt.stan);
    assert_eq!(parked[0].1.amount, dec("40.00"));
    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert!(history.is_empty());

    // while storage is still down, reconciliation re-parks the entry
    assert_eq!(engine.retry_unrecorded().await, 0);
    assert_eq!(engine.unrecorded_entries().len(), 1);

    // once it recovers, the parked entry drains into the ledger exactly once
    storage.fail_appends.store(false, Ordering::Relaxed);
    assert_eq!(engine.retry_unrecorded().await, 1);
    assert!(engine.unrecorded_entries().is_empty());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stan, receipt.stan);
}

#[tokio::test]
async fn failed_card_credit_restores_the_client_balance() {
    let storage = FaultyStorage::new();
    seed_client(&storage, "1001", "150.00", "0.00").await;
    let engine = LedgerEngine::new(storage.clone());
    seed_default_profile(&engine).await;
    let token = engine
        .create_card("test", card_request("1001"))
        .await
        .unwrap()
        .card_token;

    storage.fail_card_credits.store(true, Ordering::Relaxed);
    let err = engine
        .transfer_funds("chn1", "1001", &token, &dec("40.00"), "840", FundingSource::Wallet)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));

    // the debit was reversed to the cent and nothing reached the ledger
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("150.00")
    );
    let details = engine.retrieve_details("chn1", &token).await.unwrap();
    assert_eq!(details.available_balance, dec("0"));
    assert!(engine.unrecorded_entries().is_empty());
    let today = format_wire_date(chrono::Utc::now().naive_utc().date());
    let history = engine
        .transaction_history("chn1", &token, &today, &today)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn qr_withdrawal_requests_are_recorded_against_the_client() {
    let storage = MemoryStorage::new();
    seed_client(&storage, "1001", "150.00", "0.00").await;
    let engine = LedgerEngine::new(storage.clone());

    let receipt = engine
        .qr_code_withdrawal("chn1", "tx-771", &dec("25.00"), "USD", "70123456")
        .await
        .unwrap();
    assert!(receipt.payload.starts_with("tx-771|25.00|840|70123456|"));
    assert_eq!(receipt.expires_in_seconds, 300);

    let client = storage.get_client("1001").await.unwrap().unwrap();
    assert_eq!(client.qr_withdrawals.len(), 1);
    assert_eq!(client.qr_withdrawals[0].transaction_id, "tx-771");
    assert_eq!(client.qr_withdrawals[0].amount, dec("25.00"));
    assert_eq!(client.qr_withdrawals[0].currency, "840");

    // no balance moves until the withdrawal settles externally
    assert_eq!(
        engine.clients().wallet_balance("1001", "840").await.unwrap(),
        dec("150.00")
    );

    let err = engine
        .qr_code_withdrawal("chn1", "tx-772", &dec("25.00"), "840", "00000000")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ClientNotFound(_)));

    let err = engine
        .qr_code_withdrawal("chn1", "tx-773", &dec("-1.00"), "840", "70123456")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
