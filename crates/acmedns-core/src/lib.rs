// # acmedns-core
//
// Core library for the acme-dns DNS-01 authentication hook.
//
// ## Architecture Overview
//
// - **CredentialStore**: Trait for the per-domain account storage
// - **AcmeDnsApi**: Trait for the remote registration/update API
// - **AuthHook**: Orchestrates one validation event (lookup → register → save → update)
// - **ClientConfig**: Resolved configuration handed to the binary and the client
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Transport lives in `acmedns-client`, not here
// 2. **Idempotency**: An account is registered once per domain and reused
// 3. **Fail Loudly**: Every error is returned; only the binary prints and exits
// 4. **Library-First**: Tests drive the hook with in-memory doubles

pub mod account;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod traits;

// Re-export core types for convenience
pub use account::{Account, CnameRecord, ValidationContext, normalize_domain};
pub use config::{ClientConfig, ClientIdentity, TlsConfig};
pub use engine::{AuthHook, HookEvent, HookOptions, RunReport};
pub use error::{Error, Result};
pub use storage::{FileCredentialStore, MemoryCredentialStore};
pub use traits::{AcmeDnsApi, CredentialStore};
