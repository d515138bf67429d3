// # Credential Store Trait
//
// Defines the interface for persistent account storage.
//
// ## Purpose
//
// The credential store is what makes the hook idempotent across renewals:
// an account registered on the first run is looked up on every later run
// instead of being registered again.
//
// ## Keys
//
// Keys are always base domains. Implementations normalise the domain with
// [`normalize_domain`](crate::account::normalize_domain) on both `fetch` and
// `put`, so `*.example.com` and `example.com` resolve to the same entry.
//
// ## Implementations
//
// - File-based: JSON file, atomic replace (`FileCredentialStore`)
// - In-memory: tests and embedding (`MemoryCredentialStore`)

use async_trait::async_trait;

use crate::account::Account;

/// Trait for credential store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores may perform local I/O. They must not talk to the remote service
/// and must not decide whether a registration is needed (owned by `AuthHook`).
///
/// ## Implementation Guidelines
///
/// - **Explicit save**: `put` only mutates memory; `save()` persists the whole mapping
/// - **All or nothing**: `save()` must never leave a partially written file behind
/// - **Missing is not an error**: `fetch` returns `Ok(None)` for unknown domains
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the stored account for a domain
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Account))`: An account is stored for the (normalised) domain
    /// - `Ok(None)`: No account found
    /// - `Err(Error)`: Storage error
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, crate::Error>;

    /// Insert or replace the account for a domain (in memory)
    async fn put(&self, domain: &str, account: Account) -> Result<(), crate::Error>;

    /// Persist the full mapping
    async fn save(&self) -> Result<(), crate::Error>;

    /// List all domains in the store
    async fn domains(&self) -> Result<Vec<String>, crate::Error>;
}
