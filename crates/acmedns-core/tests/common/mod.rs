//! Test doubles and common utilities for hook contract tests

#![allow(dead_code)]

use acmedns_core::account::Account;
use acmedns_core::error::{Error, Result};
use acmedns_core::traits::{AcmeDnsApi, CredentialStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Recorded calls made against a [`MockAcmeDns`]
#[derive(Debug, Default)]
pub struct ApiCalls {
    pub register: Vec<Vec<String>>,
    pub update: Vec<(Account, String)>,
}

/// Mock acme-dns API with call recording and configurable failures
///
/// Clones share counters and recordings.
#[derive(Clone)]
pub struct MockAcmeDns {
    next_account: Account,
    register_status: Option<(u16, String)>,
    update_status: Option<(u16, String)>,
    registrations: Arc<AtomicUsize>,
    calls: Arc<Mutex<ApiCalls>>,
}

impl MockAcmeDns {
    /// A mock whose registrations hand out `account`
    pub fn new(account: Account) -> Self {
        Self {
            next_account: account,
            register_status: None,
            update_status: None,
            registrations: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(ApiCalls::default())),
        }
    }

    /// Make `/register` answer with a non-201 status
    pub fn failing_register(mut self, status: u16, body: &str) -> Self {
        self.register_status = Some((status, body.to_string()));
        self
    }

    /// Make `/update` answer with a non-200 status
    pub fn failing_update(mut self, status: u16, body: &str) -> Self {
        self.update_status = Some((status, body.to_string()));
        self
    }

    pub fn register_call_count(&self) -> usize {
        self.calls.lock().unwrap().register.len()
    }

    pub fn update_call_count(&self) -> usize {
        self.calls.lock().unwrap().update.len()
    }

    pub fn register_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().register.clone()
    }

    pub fn update_calls(&self) -> Vec<(Account, String)> {
        self.calls.lock().unwrap().update.clone()
    }
}

#[async_trait::async_trait]
impl AcmeDnsApi for MockAcmeDns {
    async fn register(&self, allow_from: &[String]) -> Result<Account> {
        self.calls.lock().unwrap().register.push(allow_from.to_vec());

        if let Some((status, ref body)) = self.register_status {
            return Err(Error::Registration {
                status,
                body: body.clone(),
            });
        }

        // Every registration yields a distinct account, like the real service
        let n = self.registrations.fetch_add(1, Ordering::SeqCst);
        let mut account = self.next_account.clone();
        if n > 0 {
            account.subdomain = format!("{}-{}", account.subdomain, n);
            account.fulldomain = format!("{}-{}", n, account.fulldomain);
        }
        account.allowfrom = allow_from.to_vec();
        Ok(account)
    }

    async fn update_txt(&self, account: &Account, txt: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .update
            .push((account.clone(), txt.to_string()));

        if let Some((status, ref body)) = self.update_status {
            return Err(Error::Update {
                request: String::new(),
                status,
                body: body.clone(),
            });
        }
        Ok(())
    }

    fn api_name(&self) -> &'static str {
        "mock"
    }
}

/// Store whose `save()` always fails
#[derive(Default)]
pub struct FailingSaveStore {
    inner: acmedns_core::MemoryCredentialStore,
}

impl FailingSaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for FailingSaveStore {
    async fn fetch(&self, domain: &str) -> Result<Option<Account>> {
        self.inner.fetch(domain).await
    }

    async fn put(&self, domain: &str, account: Account) -> Result<()> {
        self.inner.put(domain, account).await
    }

    async fn save(&self) -> Result<()> {
        Err(Error::state_store("Could not write storage file: disk full"))
    }

    async fn domains(&self) -> Result<Vec<String>> {
        self.inner.domains().await
    }
}

/// The account from the end-to-end new-domain scenario
pub fn sample_account() -> Account {
    Account {
        username: "u".to_string(),
        password: "p".to_string(),
        subdomain: "sub1".to_string(),
        fulldomain: "sub1.acme-dns.example".to_string(),
        allowfrom: Vec::new(),
        extra: Default::default(),
    }
}

/// A previously stored account for an existing domain
pub fn stored_account() -> Account {
    Account {
        username: "stored-user".to_string(),
        password: "stored-pass".to_string(),
        subdomain: "stored".to_string(),
        fulldomain: "stored.acme-dns.example".to_string(),
        allowfrom: Vec::new(),
        extra: Default::default(),
    }
}
