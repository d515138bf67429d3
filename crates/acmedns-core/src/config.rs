//! Configuration types for the acme-dns hook
//!
//! Configuration is resolved once at startup, in this order:
//!
//! 1. Built-in defaults
//! 2. A JSON configuration file (`conf.json`)
//! 3. `ACME_DNS__<FIELD>` environment variables
//!
//! The result is validated and then handed by value to the client and the hook.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::HookOptions;
use crate::error::{Error, Result};

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "ACME_DNS__";

/// Default credential storage path
pub const DEFAULT_STORAGE_PATH: &str = "/etc/letsencrypt/acmedns.json";

/// Default mTLS client certificate path
pub const DEFAULT_MTLS_CERT_PATH: &str = "/etc/letsencrypt/acmedns_mtls_client_cert.pem";

/// Default mTLS client key path
pub const DEFAULT_MTLS_KEY_PATH: &str = "/etc/letsencrypt/acmedns_mtls_client_key.pem";

/// Main hook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the acme-dns instance (e.g. `https://acme-dns.example.com`)
    pub acmedns_url: String,

    /// Path of the credential storage file
    pub storage_path: PathBuf,

    /// Networks allowed to update newly registered accounts
    ///
    /// Example: `["192.168.10.0/24", "::1/128"]`
    pub allow_from: Vec<String>,

    /// Register a new account even if one is stored, overwriting it
    pub force_register: bool,

    /// Present a client certificate (only meaningful over HTTPS)
    pub use_mtls: bool,

    /// PEM client certificate for mTLS
    pub mtls_cert_path: PathBuf,

    /// PEM private key for mTLS
    pub mtls_key_path: PathBuf,

    /// PEM trust anchor used instead of the system roots (empty = system roots)
    #[serde(deserialize_with = "empty_path_as_none")]
    pub server_cert_path: Option<PathBuf>,

    /// Accept invalid server certificates (not recommended)
    pub skip_verify_server_cert: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            acmedns_url: String::new(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            allow_from: Vec::new(),
            force_register: false,
            use_mtls: false,
            mtls_cert_path: PathBuf::from(DEFAULT_MTLS_CERT_PATH),
            mtls_key_path: PathBuf::from(DEFAULT_MTLS_KEY_PATH),
            server_cert_path: None,
            skip_verify_server_cert: false,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON configuration document
    ///
    /// Missing keys keep their defaults.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Configuration file could not be parsed: {}", e)))
    }

    /// Load a JSON configuration file
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: The file does not exist
    /// - `Ok(Some(config))`: The file was read and parsed
    /// - `Err(Error::Config)`: The file exists but could not be read or parsed
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json_str(&content)
                .map(Some)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::config(format!(
                "{} exists but could not be loaded: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Load a configuration file the operator named explicitly
    ///
    /// Unlike [`ClientConfig::load_file`], a missing file is an error.
    pub fn load_required_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::load_file(path)?.ok_or_else(|| {
            Error::config(format!("Configuration file {} does not exist", path.display()))
        })
    }

    /// Apply `ACME_DNS__<FIELD>` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// `lookup` receives the full variable name, e.g. `ACME_DNS__ACMEDNS_URL`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: &str| lookup(&format!("{}{}", ENV_PREFIX, field.to_uppercase()));

        if let Some(url) = var("acmedns_url") {
            self.acmedns_url = url;
        }
        if let Some(path) = var("storage_path") {
            self.storage_path = PathBuf::from(path);
        }
        if let Some(raw) = var("allow_from") {
            self.allow_from = parse_list(&raw)?;
        }
        if let Some(raw) = var("force_register") {
            self.force_register = parse_bool("force_register", &raw)?;
        }
        if let Some(raw) = var("use_mtls") {
            self.use_mtls = parse_bool("use_mtls", &raw)?;
        }
        if let Some(path) = var("mtls_cert_path") {
            self.mtls_cert_path = PathBuf::from(path);
        }
        if let Some(path) = var("mtls_key_path") {
            self.mtls_key_path = PathBuf::from(path);
        }
        if let Some(path) = var("server_cert_path") {
            self.server_cert_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Some(raw) = var("skip_verify_server_cert") {
            self.skip_verify_server_cert = parse_bool("skip_verify_server_cert", &raw)?;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Checks that everything needed before the first network call is in
    /// place, including that configured TLS material exists on disk.
    pub fn validate(&self) -> Result<()> {
        if self.acmedns_url.is_empty() {
            return Err(Error::config(format!(
                "acme-dns URL is not configured. Set acmedns_url in conf.json or {}ACMEDNS_URL",
                ENV_PREFIX
            )));
        }
        if !self.acmedns_url.starts_with("https://") && !self.acmedns_url.starts_with("http://") {
            return Err(Error::config(format!(
                "acme-dns URL must use HTTP or HTTPS scheme. Got: {}",
                self.acmedns_url
            )));
        }

        if self.storage_path.as_os_str().is_empty() {
            return Err(Error::config("Storage path cannot be empty"));
        }

        for entry in &self.allow_from {
            validate_cidr(entry)?;
        }

        if self.use_mtls
            && (!self.mtls_cert_path.is_file() || !self.mtls_key_path.is_file())
        {
            return Err(Error::config(format!(
                "mTLS is enabled but client certificate ({}) or key ({}) file does not exist",
                self.mtls_cert_path.display(),
                self.mtls_key_path.display()
            )));
        }

        if let Some(ref ca) = self.server_cert_path
            && !ca.is_file()
        {
            return Err(Error::config(format!(
                "Server certificate file does not exist: {}",
                ca.display()
            )));
        }

        Ok(())
    }

    /// Transport settings for the HTTP client
    pub fn tls(&self) -> TlsConfig {
        TlsConfig {
            client_identity: self.use_mtls.then(|| ClientIdentity {
                cert_path: self.mtls_cert_path.clone(),
                key_path: self.mtls_key_path.clone(),
            }),
            server_ca_path: self.server_cert_path.clone(),
            skip_verify: self.skip_verify_server_cert,
        }
    }

    /// Options for the run orchestrator
    pub fn hook_options(&self) -> HookOptions {
        HookOptions {
            allow_from: self.allow_from.clone(),
            force_register: self.force_register,
        }
    }
}

/// TLS settings, consumed only by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Client certificate and key for mTLS
    pub client_identity: Option<ClientIdentity>,
    /// Custom trust anchor replacing the built-in roots
    pub server_ca_path: Option<PathBuf>,
    /// Accept invalid server certificates
    pub skip_verify: bool,
}

/// PEM certificate/key pair presented to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn empty_path_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path: Option<String> = Option::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.is_empty()).map(PathBuf::from))
}

/// Parse a list given as a JSON array or as comma separated values
fn parse_list(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| Error::config(format!("Invalid list '{}': {}", raw, e)));
    }

    Ok(trimmed
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{}{} must be a boolean. Got: {}",
            ENV_PREFIX,
            field.to_uppercase(),
            raw
        ))),
    }
}

/// Check that `entry` looks like `<ip>/<prefix>`
fn validate_cidr(entry: &str) -> Result<()> {
    let invalid = || Error::config(format!("Invalid allow_from network: '{}'", entry));

    let (addr, prefix) = entry.split_once('/').ok_or_else(invalid)?;
    let addr: std::net::IpAddr = addr.trim().parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.trim().parse().map_err(|_| invalid())?;

    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }

    Ok(())
}
