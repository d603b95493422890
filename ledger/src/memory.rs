//! Embedded in-process store engine.
//!
//! Rows live in memory and carry their own exclusive lock, playing the part
//! PostgreSQL's row locks play for [`PostgresStore`](crate::PostgresStore).
//! A transaction stages balance changes privately while holding the locks of
//! the rows it touches and publishes them all at commit.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use pairledger_common::{Account, AccountId, LedgerError, Money, NewAccount, Result};

use crate::store::{AccountStore, StoreTransaction};

type RowMap = Arc<RwLock<BTreeMap<AccountId, Arc<Row>>>>;

/// A stored account row.
struct Row {
    /// Exclusive row lock, held by at most one transaction.
    lock: Arc<Mutex<()>>,
    /// Last committed balance.
    balance: RwLock<Money>,
    created_at: DateTime<Utc>,
}

impl Row {
    fn new(balance: Money) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            balance: RwLock::new(balance),
            created_at: Utc::now(),
        }
    }

    fn committed(&self, id: AccountId) -> Account {
        Account {
            id,
            balance: *self.balance.read(),
            created_at: self.created_at,
        }
    }
}

fn numeric_overflow(id: AccountId) -> LedgerError {
    LedgerError::StoreFailure(format!("numeric field overflow for account {id}"))
}

/// In-memory implementation of [`AccountStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: RowMap,
    /// Held exclusively while a commit publishes its writes.
    commit_gate: Arc<RwLock<()>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Committed state of every row, ascending by id.
    ///
    /// The snapshot never observes half of a commit.
    pub fn snapshot(&self) -> Vec<Account> {
        let _gate = self.commit_gate.read();
        self.rows
            .read()
            .iter()
            .map(|(id, row)| row.committed(*id))
            .collect()
    }

    /// Sum of every committed balance.
    pub fn total_balance(&self) -> Money {
        self.snapshot().iter().map(|account| account.balance).sum()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_if_absent(&self, account: &NewAccount) -> Result<bool> {
        let balance = account
            .initial_balance
            .to_storage()
            .ok_or_else(|| numeric_overflow(account.id))?;

        let mut rows = self.rows.write();
        match rows.entry(account.id) {
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Row::new(balance)));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn fetch(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.rows.read().get(&id).map(|row| row.committed(id)))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            rows: self.rows.clone(),
            commit_gate: self.commit_gate.clone(),
            locked: BTreeMap::new(),
            finished: false,
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A row locked by a [`MemoryTransaction`].
struct LockedRow {
    row: Arc<Row>,
    /// Balance as seen by this transaction, including staged writes.
    pending: Money,
    _guard: OwnedMutexGuard<()>,
}

/// Transaction over a [`MemoryStore`].
///
/// Dropping it releases every row lock and forgets the staged balances.
pub struct MemoryTransaction {
    rows: RowMap,
    commit_gate: Arc<RwLock<()>>,
    locked: BTreeMap<AccountId, LockedRow>,
    finished: bool,
}

impl MemoryTransaction {
    fn ensure_active(&self) -> Result<()> {
        if self.finished {
            return Err(LedgerError::StoreFailure(
                "transaction already finished".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>> {
        self.ensure_active()?;

        let mut accounts = Vec::with_capacity(ids.len());
        for &id in ids {
            if !self.locked.contains_key(&id) {
                let row = self.rows.read().get(&id).cloned();
                let Some(row) = row else {
                    continue;
                };
                let guard = row.lock.clone().lock_owned().await;
                let pending = *row.balance.read();
                self.locked.insert(
                    id,
                    LockedRow {
                        row,
                        pending,
                        _guard: guard,
                    },
                );
            }

            if let Some(locked) = self.locked.get(&id) {
                accounts.push(Account {
                    id,
                    balance: locked.pending,
                    created_at: locked.row.created_at,
                });
            }
        }

        Ok(accounts)
    }

    async fn apply_delta(&mut self, id: AccountId, delta: Money) -> Result<()> {
        self.ensure_active()?;

        let locked = self.locked.get_mut(&id).ok_or_else(|| {
            LedgerError::StoreFailure(format!("account {id} is not locked by this transaction"))
        })?;
        locked.pending = locked
            .pending
            .checked_add(delta)
            .and_then(|balance| balance.to_storage())
            .ok_or_else(|| numeric_overflow(id))?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;

        {
            let _gate = self.commit_gate.write();
            for locked in self.locked.values() {
                *locked.row.balance.write() = locked.pending;
            }
        }

        self.finished = true;
        self.locked.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        self.locked.clear();
        Ok(())
    }
}
