//! Account records and per-run validation context

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Label prepended to the base domain to form the DNS-01 validation name
pub const VALIDATION_LABEL: &str = "_acme-challenge";

/// An acme-dns account, as returned by `/register`
///
/// Records are never edited in place. Re-registration replaces the whole
/// record in the credential store.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// API user, sent as `X-Api-User`
    pub username: String,
    /// API key, sent as `X-Api-Key`
    /// ⚠️ NEVER log this value
    pub password: String,
    /// Subdomain label assigned by the service
    pub subdomain: String,
    /// Fully-qualified delegated name the CNAME must point at
    pub fulldomain: String,
    /// Networks the service accepts updates from (echoed back on registration)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowfrom: Vec<String>,
    /// Keys this client does not interpret, kept so other writers' entries round-trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("subdomain", &self.subdomain)
            .field("fulldomain", &self.fulldomain)
            .field("allowfrom", &self.allowfrom)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Strip a single leading wildcard label (`*.`)
///
/// A wildcard certificate and its base domain are validated through the same
/// `_acme-challenge` name, so they share one account.
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Everything derived from one invocation of the hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    base_domain: String,
    validation_name: String,
    token: String,
}

impl ValidationContext {
    /// Build the context for a domain under validation and its challenge token
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the domain (after wildcard stripping) or
    /// the token is empty.
    pub fn new(domain: &str, token: &str) -> Result<Self> {
        let base_domain = normalize_domain(domain.trim());
        if base_domain.is_empty() {
            return Err(Error::config("Domain under validation is empty"));
        }
        if token.is_empty() {
            return Err(Error::config("Validation token is empty"));
        }

        Ok(Self {
            validation_name: format!("{}.{}", VALIDATION_LABEL, base_domain),
            base_domain: base_domain.to_string(),
            token: token.to_string(),
        })
    }

    /// Base (non-wildcard) domain; this is the credential store key
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// `_acme-challenge.<base-domain>`
    pub fn validation_name(&self) -> &str {
        &self.validation_name
    }

    /// One-time challenge token for this run
    pub fn token(&self) -> &str {
        &self.token
    }

    /// CNAME the operator must add for the given account
    pub fn cname_for(&self, account: &Account) -> CnameRecord {
        CnameRecord {
            name: self.validation_name.clone(),
            target: account.fulldomain.clone(),
        }
    }
}

/// DNS record the operator has to add to their main zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameRecord {
    /// Owner name (`_acme-challenge.<base-domain>`)
    pub name: String,
    /// Delegated acme-dns name
    pub target: String,
}

impl fmt::Display for CnameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} CNAME {}.", self.name, self.target.trim_end_matches('.'))
    }
}
