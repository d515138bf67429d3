// # Memory Credential Store
//
// In-memory implementation of CredentialStore.
//
// Nothing survives the process: every run against an empty memory store
// registers a fresh account. Useful for tests and for embedders that keep
// credentials elsewhere.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::account::{Account, normalize_domain};
use crate::traits::credential_store::CredentialStore;

/// In-memory credential store
///
/// Clones share the same underlying map, so a test can hand one clone to
/// the hook and inspect the other afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use acmedns_core::storage::MemoryCredentialStore;
/// use acmedns_core::traits::CredentialStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryCredentialStore::new();
///     assert!(store.fetch("example.com").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<BTreeMap<String, Account>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryCredentialStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with accounts
    ///
    /// Keys are normalised the same way `put` normalises them.
    pub fn with_accounts<I, K>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (K, Account)>,
        K: AsRef<str>,
    {
        let map = accounts
            .into_iter()
            .map(|(k, v)| (normalize_domain(k.as_ref()).to_string(), v))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `save()` was called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of the current mapping
    pub async fn snapshot(&self) -> BTreeMap<String, Account> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.get(normalize_domain(domain)).cloned())
    }

    async fn put(&self, domain: &str, account: Account) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.insert(normalize_domain(domain).to_string(), account);
        Ok(())
    }

    async fn save(&self) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn domains(&self) -> Result<Vec<String>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.keys().cloned().collect())
    }
}
