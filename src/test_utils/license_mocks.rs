//! In-memory transactional license store.
//!
//! Units of work run side by side. Each one buffers its writes and reads the latest
//! committed tables with its own writes applied on top, like a read-committed
//! transaction. `lock_user` takes a per-user lock held until the unit of work is
//! committed or dropped. Commit applies the buffered writes, drop discards them.
//! Every read yields to the scheduler first, the way a database round trip would.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::license::{LicenseStore, LicenseUnitOfWork},
    domain::entities::license_key::LicenseKey,
};

#[derive(Debug, Clone, Default)]
pub struct LicenseTables {
    pub keys: HashMap<String, LicenseKey>,
    pub bindings: HashMap<i64, String>,
    pub last_free: HashMap<i64, i64>,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    PutKey(LicenseKey),
    DeleteKey(String),
    DeleteExpired(i64),
    Bind(i64, String),
    RecordFreeIssue(i64, i64),
}

impl PendingWrite {
    fn apply(&self, tables: &mut LicenseTables) {
        match self {
            PendingWrite::PutKey(record) => {
                tables.keys.insert(record.key.clone(), record.clone());
            }
            PendingWrite::DeleteKey(key) => {
                tables.keys.remove(key);
            }
            PendingWrite::DeleteExpired(now) => tables.keys.retain(|_, k| k.is_live(*now)),
            PendingWrite::Bind(user_id, key) => {
                tables.bindings.insert(*user_id, key.clone());
            }
            PendingWrite::RecordFreeIssue(user_id, issued_at) => {
                tables.last_free.insert(*user_id, *issued_at);
            }
        }
    }
}

type UserLocks = Arc<std::sync::Mutex<HashMap<i64, Arc<Mutex<()>>>>>;

#[derive(Default)]
pub struct InMemoryLicenseStore {
    tables: Arc<Mutex<LicenseTables>>,
    user_locks: UserLocks,
    committed_writes: Arc<AtomicUsize>,
    fail_commits: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_key(&self, record: LicenseKey) {
        self.tables
            .lock()
            .await
            .keys
            .insert(record.key.clone(), record);
    }

    /// Copy of the committed tables (for test assertions).
    pub async fn snapshot(&self) -> LicenseTables {
        self.tables.lock().await.clone()
    }

    /// Number of row writes made by committed units of work.
    pub fn committed_writes(&self) -> usize {
        self.committed_writes.load(Ordering::SeqCst)
    }

    /// Make every following commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make every following `begin` fail, as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl LicenseStore for InMemoryLicenseStore {
    async fn begin(&self) -> AppResult<Box<dyn LicenseUnitOfWork>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }
        Ok(Box::new(InMemoryUnitOfWork {
            tables: self.tables.clone(),
            user_locks: self.user_locks.clone(),
            held: Vec::new(),
            pending: Vec::new(),
            writes: 0,
            committed_writes: self.committed_writes.clone(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct InMemoryUnitOfWork {
    tables: Arc<Mutex<LicenseTables>>,
    user_locks: UserLocks,
    /// Released when the unit of work is dropped, after any commit.
    held: Vec<OwnedMutexGuard<()>>,
    pending: Vec<PendingWrite>,
    writes: usize,
    committed_writes: Arc<AtomicUsize>,
    fail_commit: bool,
}

impl InMemoryUnitOfWork {
    /// Committed tables with this unit of work's writes applied.
    async fn view(&self) -> LicenseTables {
        tokio::task::yield_now().await;
        let mut tables = self.tables.lock().await.clone();
        for write in &self.pending {
            write.apply(&mut tables);
        }
        tables
    }

    fn push(&mut self, write: PendingWrite, rows: usize) {
        self.pending.push(write);
        self.writes += rows;
    }
}

#[async_trait]
impl LicenseUnitOfWork for InMemoryUnitOfWork {
    async fn lock_user(&mut self, user_id: i64) -> AppResult<()> {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            locks.entry(user_id).or_default().clone()
        };
        self.held.push(lock.lock_owned().await);
        Ok(())
    }

    async fn get_key(&mut self, key: &str) -> AppResult<Option<LicenseKey>> {
        Ok(self.view().await.keys.get(key).cloned())
    }

    async fn put_key(&mut self, record: &LicenseKey) -> AppResult<()> {
        self.push(PendingWrite::PutKey(record.clone()), 1);
        Ok(())
    }

    async fn delete_key(&mut self, key: &str) -> AppResult<bool> {
        let existed = self.view().await.keys.contains_key(key);
        if existed {
            self.push(PendingWrite::DeleteKey(key.to_string()), 1);
        }
        Ok(existed)
    }

    async fn list_keys(&mut self) -> AppResult<Vec<LicenseKey>> {
        Ok(self.view().await.keys.into_values().collect())
    }

    async fn delete_expired(&mut self, now: i64) -> AppResult<u64> {
        let purged = self
            .view()
            .await
            .keys
            .values()
            .filter(|k| !k.is_live(now))
            .count();
        self.push(PendingWrite::DeleteExpired(now), purged);
        Ok(purged as u64)
    }

    async fn bound_key(&mut self, user_id: i64) -> AppResult<Option<String>> {
        Ok(self.view().await.bindings.get(&user_id).cloned())
    }

    async fn bind_key(&mut self, user_id: i64, key: &str) -> AppResult<()> {
        self.push(PendingWrite::Bind(user_id, key.to_string()), 1);
        Ok(())
    }

    async fn last_free_issue(&mut self, user_id: i64) -> AppResult<Option<i64>> {
        Ok(self.view().await.last_free.get(&user_id).copied())
    }

    async fn record_free_issue(&mut self, user_id: i64, issued_at: i64) -> AppResult<()> {
        self.push(PendingWrite::RecordFreeIssue(user_id, issued_at), 1);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.fail_commit {
            return Err(AppError::Database("Database operation failed".into()));
        }
        let mut tables = self.tables.lock().await;
        for write in &self.pending {
            write.apply(&mut tables);
        }
        self.committed_writes.fetch_add(self.writes, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_key;

    #[tokio::test]
    async fn dropped_unit_of_work_writes_nothing() {
        let store = InMemoryLicenseStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.put_key(&create_test_key("AB1?CD", 100, |_| {})).await.unwrap();
        assert!(uow.get_key("AB1?CD").await.unwrap().is_some());
        drop(uow);

        assert!(store.snapshot().await.keys.is_empty());
        assert_eq!(store.committed_writes(), 0);
    }

    #[tokio::test]
    async fn user_lock_is_held_until_commit() {
        let store = Arc::new(InMemoryLicenseStore::new());
        let mut first = store.begin().await.unwrap();
        first.lock_user(1).await.unwrap();
        first.bind_key(1, "AB1?CD").await.unwrap();

        let second = tokio::spawn({
            let store = store.clone();
            async move {
                let mut uow = store.begin().await.unwrap();
                uow.lock_user(1).await.unwrap();
                uow.bound_key(1).await.unwrap()
            }
        });
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        // another user is not blocked
        let mut other = store.begin().await.unwrap();
        other.lock_user(2).await.unwrap();
        drop(other);

        first.commit().await.unwrap();
        assert_eq!(second.await.unwrap().as_deref(), Some("AB1?CD"));
    }
}
