//! Client directory: per-client wallet and account balances

use bigdecimal::BigDecimal;

use crate::traits::*;
use crate::types::*;

/// Directory of clients and their per-currency balance buckets
///
/// The only component that owns client records. Balance-affecting mutations
/// go through the conditional [`debit`](ClientDirectory::debit) /
/// [`credit`](ClientDirectory::credit) primitives, which the storage layer
/// applies atomically per balance field.
pub struct ClientDirectory<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> ClientDirectory<S> {
    /// Create a new client directory
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Get a client by id
    pub async fn get_client(&self, client_id: &str) -> LedgerResult<Option<Client>> {
        self.storage.get_client(client_id).await
    }

    /// Get a client by id, returning an error if not found
    pub async fn require_client(&self, client_id: &str) -> LedgerResult<Client> {
        self.storage
            .get_client(client_id)
            .await?
            .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))
    }

    /// Wallet balance for a currency; unknown currency reads 0
    pub async fn wallet_balance(
        &self,
        client_id: &str,
        currency: &str,
    ) -> LedgerResult<BigDecimal> {
        let client = self.require_client(client_id).await?;
        Ok(client.balance(FundingSource::Wallet, currency))
    }

    /// Account balance for a currency; unknown currency reads 0
    pub async fn account_balance(
        &self,
        client_id: &str,
        currency: &str,
    ) -> LedgerResult<BigDecimal> {
        let client = self.require_client(client_id).await?;
        Ok(client.balance(FundingSource::Account, currency))
    }

    /// Overwrite the wallet balance for a currency, creating the entry if absent
    pub async fn set_wallet_balance(
        &self,
        client_id: &str,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        self.set_balance(client_id, FundingSource::Wallet, currency, balance)
            .await
    }

    /// Overwrite the account balance for a currency, creating the entry if absent
    pub async fn set_account_balance(
        &self,
        client_id: &str,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        self.set_balance(client_id, FundingSource::Account, currency, balance)
            .await
    }

    async fn set_balance(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        if balance < BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Balance must not be negative".to_string(),
            ));
        }
        self.require_client(client_id).await?;
        self.storage
            .set_client_balance(client_id, source, currency, balance)
            .await
    }

    /// Conditionally debit a balance bucket; refuses rather than go negative
    pub async fn debit(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        amount: &BigDecimal,
    ) -> LedgerResult<BalanceChange> {
        self.storage
            .adjust_client_balance(client_id, source, currency, BalanceDelta::Debit(amount.clone()))
            .await
    }

    /// Credit a balance bucket, creating the currency entry if absent
    pub async fn credit(
        &self,
        client_id: &str,
        source: FundingSource,
        currency: &str,
        amount: &BigDecimal,
    ) -> LedgerResult<BalanceChange> {
        self.storage
            .adjust_client_balance(
                client_id,
                source,
                currency,
                BalanceDelta::Credit(amount.clone()),
            )
            .await
    }

    /// Update the client's contact mobile number
    pub async fn set_mobile(&self, client_id: &str, mobile: &str) -> LedgerResult<()> {
        self.require_client(client_id).await?;
        self.storage.set_client_mobile(client_id, mobile).await
    }

    /// Record a QR withdrawal request against the client with this mobile
    pub async fn record_qr_withdrawal(
        &self,
        mobile: &str,
        entry: &QrWithdrawal,
    ) -> LedgerResult<()> {
        self.storage.append_qr_withdrawal(mobile, entry).await
    }
}
