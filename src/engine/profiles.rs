//! Limit profile catalog

use crate::traits::*;
use crate::types::*;

/// Read-mostly catalog of named limit policies
///
/// Read-only from the engine's perspective; [`save`](LimitProfileCatalog::save)
/// exists for seeding and administrative processes outside the core.
pub struct LimitProfileCatalog<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> LimitProfileCatalog<S> {
    /// Create a new catalog
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Look up a profile by id
    pub async fn lookup(&self, profile_id: &str) -> LedgerResult<Option<LimitProfile>> {
        self.storage.get_limit_profile(profile_id).await
    }

    /// All profiles, in storage order
    pub async fn list_all(&self) -> LedgerResult<Vec<LimitProfile>> {
        self.storage.list_limit_profiles().await
    }

    /// Save a profile (administrative/seeding use)
    pub async fn save(&self, profile: &LimitProfile) -> LedgerResult<()> {
        self.storage.save_limit_profile(profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;

    #[tokio::test]
    async fn lookup_and_list() {
        let catalog = LimitProfileCatalog::new(MemoryStorage::new());
        let profile = LimitProfile {
            id: "ICCSLIMIT".into(),
            currency: "840".into(),
            class_tag: "STANDARD".into(),
            amount_weekly: BigDecimal::from(5000),
            amount_monthly: BigDecimal::from(20000),
            txn_count_weekly: 50,
            txn_count_monthly: 200,
        };
        catalog.save(&profile).await.unwrap();

        assert_eq!(catalog.lookup("ICCSLIMIT").await.unwrap(), Some(profile));
        assert_eq!(catalog.lookup("MISSING").await.unwrap(), None);
        assert_eq!(catalog.list_all().await.unwrap().len(), 1);
    }
}
