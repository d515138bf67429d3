//! Core traits for the acme-dns hook
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AcmeDnsApi`]: Register accounts and publish TXT tokens
//! - [`CredentialStore`]: Persistent per-domain account storage

pub mod acme_dns_api;
pub mod credential_store;

pub use acme_dns_api::AcmeDnsApi;
pub use credential_store::CredentialStore;
