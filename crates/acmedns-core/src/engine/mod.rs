//! Run orchestrator
//!
//! `AuthHook` handles one DNS-01 validation event:
//!
//! ```text
//!                 ┌──────────────┐
//!                 │   AuthHook   │
//!                 └──────────────┘
//!                        │
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//! ┌──────────────┐ ┌────────────┐ ┌──────────────┐
//! │CredentialStore│ │ AcmeDnsApi │ │  HookEvents  │
//! │ fetch / save │ │ register / │ │  (notify)    │
//! │              │ │ update_txt │ │              │
//! └──────────────┘ └────────────┘ └──────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. Look up the base domain in the CredentialStore
//! 2. If absent (or `force_register` is set), register a new account,
//!    put it and save the store, then emit `AccountRegistered`
//! 3. Publish the challenge token with `update_txt`
//! 4. Emit `TxtUpdated`
//!
//! Any error aborts the run at the failing step.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::account::{Account, CnameRecord, ValidationContext};
use crate::error::Result;
use crate::traits::{AcmeDnsApi, CredentialStore};

/// Events emitted by the AuthHook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// A new account was registered and persisted; the operator must add `cname`
    AccountRegistered {
        domain: String,
        cname: CnameRecord,
    },

    /// The challenge token was published
    TxtUpdated {
        domain: String,
        subdomain: String,
    },
}

/// Per-run options taken from configuration
#[derive(Debug, Clone, Default)]
pub struct HookOptions {
    /// CIDR ranges sent with new registrations
    pub allow_from: Vec<String>,
    /// Register a new account even if one is stored
    pub force_register: bool,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Base domain the run was for
    pub domain: String,
    /// Set when this run registered a new account
    pub registered: Option<CnameRecord>,
    /// Account the token was published with
    pub account: Account,
}

/// Orchestrates lookup, registration, persistence and update
pub struct AuthHook {
    api: Box<dyn AcmeDnsApi>,
    store: Box<dyn CredentialStore>,
    options: HookOptions,
    event_tx: mpsc::UnboundedSender<HookEvent>,
}

impl AuthHook {
    /// Create a new hook
    ///
    /// Returns the hook and the receiving end of its event channel.
    pub fn new(
        api: Box<dyn AcmeDnsApi>,
        store: Box<dyn CredentialStore>,
        options: HookOptions,
    ) -> (Self, mpsc::UnboundedReceiver<HookEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                api,
                store,
                options,
                event_tx,
            },
            event_rx,
        )
    }

    /// The credential store this hook reads and writes
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Run one validation event
    pub async fn run(&self, ctx: &ValidationContext) -> Result<RunReport> {
        let domain = ctx.base_domain();

        let stored = self.store.fetch(domain).await?;
        let (account, registered) = match stored {
            Some(account) if !self.options.force_register => {
                debug!("Using stored acme-dns account for {}", domain);
                (account, None)
            }
            stored => {
                if stored.is_some() {
                    info!("Force re-registration requested for {}", domain);
                }
                let account = self.register(ctx).await?;
                let cname = ctx.cname_for(&account);
                (account, Some(cname))
            }
        };

        self.api.update_txt(&account, ctx.token()).await?;
        info!(
            "Published TXT for {} via {} (subdomain {})",
            ctx.validation_name(),
            self.api.api_name(),
            account.subdomain
        );
        self.emit(HookEvent::TxtUpdated {
            domain: domain.to_string(),
            subdomain: account.subdomain.clone(),
        });

        Ok(RunReport {
            domain: domain.to_string(),
            registered,
            account,
        })
    }

    /// Register, persist, then notify. Nothing is emitted unless the save succeeded.
    async fn register(&self, ctx: &ValidationContext) -> Result<Account> {
        let domain = ctx.base_domain();
        info!(
            "Registering new acme-dns account for {} via {}",
            domain,
            self.api.api_name()
        );

        let account = self.api.register(&self.options.allow_from).await?;
        self.store.put(domain, account.clone()).await?;
        self.store.save().await?;

        let cname = ctx.cname_for(&account);
        info!("Registered {}: {}", domain, cname);
        self.emit(HookEvent::AccountRegistered {
            domain: domain.to_string(),
            cname,
        });

        Ok(account)
    }

    fn emit(&self, event: HookEvent) {
        // Receiver dropped means nobody is listening
        if self.event_tx.send(event).is_err() {
            debug!("Hook event receiver dropped");
        }
    }
}
