//! PairLedger Ledger Engine
//!
//! Account repository and atomic two-account transfers over a transactional
//! store. Row locks taken by the store, in ascending account id order, are the
//! only concurrency primitive.

pub mod store;
pub mod transaction;
pub mod account;
pub mod journal;
pub mod policy;
pub mod engine;
pub mod service;
pub mod memory;
pub mod postgres;

pub use store::{AccountStore, StoreTransaction};
pub use transaction::{ScopeState, TransactionScope};
pub use account::AccountRepository;
pub use journal::{EntryType, Posting, PostingPair};
pub use policy::AmountPolicy;
pub use engine::{TransferEngine, TransferPhase, TransferReceipt};
pub use service::{Ledger, LedgerConfig};
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};
