// # acme-dns API Trait
//
// Defines the interface to the remote TXT hosting service.
//
// ## Implementations
//
// - HTTP: `acmedns-client` crate
// - Test doubles: `tests/common`

use async_trait::async_trait;

use crate::account::Account;

/// Trait for acme-dns API implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the configured acme-dns instance only
/// - ✅ Parse service responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (the calling certificate tool re-runs the hook)
/// - ❌ Access the credential store (owned by `AuthHook`)
/// - ❌ Decide whether a registration is needed (owned by `AuthHook`)
/// - ❌ Print or exit (errors are returned to the binary)
///
/// Transport settings (mTLS identity, trust anchors) belong to the
/// implementation's constructor and never appear in these signatures.
#[async_trait]
pub trait AcmeDnsApi: Send + Sync {
    /// Register a new account
    ///
    /// Not idempotent: every call creates a distinct account on the service.
    ///
    /// # Parameters
    ///
    /// - `allow_from`: CIDR ranges allowed to update the account. An empty
    ///   slice means "no restriction" and the field is left out of the request.
    ///
    /// # Returns
    ///
    /// - `Ok(Account)`: The service answered `201 Created`
    /// - `Err(Error::Registration)`: Any other status
    /// - `Err(Error::Transport)`: Connection or TLS failure
    async fn register(&self, allow_from: &[String]) -> Result<Account, crate::Error>;

    /// Publish `txt` on the account's subdomain
    ///
    /// Idempotent: repeating the call with the same token republishes it.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The service answered `200 OK`
    /// - `Err(Error::Update)`: Any other status
    /// - `Err(Error::Transport)`: Connection or TLS failure
    async fn update_txt(&self, account: &Account, txt: &str) -> Result<(), crate::Error>;

    /// Name of the implementation (for logging/debugging)
    fn api_name(&self) -> &'static str;
}
