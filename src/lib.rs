//! # Card Ledger Core
//!
//! An account and card ledger engine for prepaid/debit card programs:
//! client wallet and account balances, card balances, and an append-only
//! per-card transaction history, with every balance-affecting operation
//! performed atomically under concurrent access.
//!
//! ## Features
//!
//! - **Ledger engine**: transfers between wallet/account and card, cashback
//!   redemption, PIN changes, status and limit-profile mutations
//! - **Card registry**: card creation with unique tokens and numbers,
//!   masked listings, single-record updates
//! - **Client directory**: per-currency wallet and account balance buckets
//! - **Transaction ledger**: append-only, complete and ordered per card
//! - **Storage abstraction**: backend-agnostic design with a trait-based
//!   storage interface and an in-memory implementation for testing
//!
//! ## Quick Start
//!
//! ```rust
//! use card_ledger_core::{LedgerEngine, MemoryStorage};
//!
//! let engine = LedgerEngine::new(MemoryStorage::new());
//! // seed clients and limit profiles, then drive operations on the engine
//! ```

pub mod currency;
pub mod engine;
pub mod pin;
pub mod reference;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use engine::*;
pub use reference::StanGenerator;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;
