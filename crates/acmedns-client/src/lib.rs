// # acme-dns HTTP Client
//
// This crate provides the HTTP implementation of `AcmeDnsApi` used by the
// acme-dns authentication hook.
//
// ## Trust Level: Untrusted (API implementation)
//
// - ✅ One HTTP request per call, to the configured instance only
// - ✅ Full error propagation (the certificate tool re-runs the hook)
// - ❌ NO retry or backoff
// - ❌ NO caching (accounts are owned by the CredentialStore)
//
// ## Security Requirements
//
// - The API key NEVER appears in logs, `Debug` output or error diagnostics
// - TLS material is loaded once, in the constructor; protocol methods never see it
//
// ## API Reference
//
// - Register: POST `/register`, optional body `{"allowfrom": [...]}`, 201 on success
// - Update: POST `/update`, headers `X-Api-User` / `X-Api-Key`,
//   body `{"subdomain": ..., "txt": ...}`, 200 on success

use acmedns_core::config::{ClientConfig, TlsConfig};
use acmedns_core::traits::AcmeDnsApi;
use acmedns_core::{Account, Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Timeout for establishing a connection (including the TLS handshake)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the account username
pub const HEADER_API_USER: &str = "X-Api-User";

/// Header carrying the account password
pub const HEADER_API_KEY: &str = "X-Api-Key";

const REDACTED: &str = "<REDACTED>";

/// Body of `POST /register`
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    allowfrom: &'a [String],
}

/// Body of `POST /update`
#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    subdomain: &'a str,
    txt: &'a str,
}

/// Registration body for an allow-list
///
/// `None` means the request is sent without a body: acme-dns reads a missing
/// `allowfrom` as "no restriction", which an empty list would not express.
pub fn registration_body(allow_from: &[String]) -> Option<Value> {
    if allow_from.is_empty() {
        return None;
    }
    serde_json::to_value(RegisterRequest {
        allowfrom: allow_from,
    })
    .ok()
}

/// HTTP client for one acme-dns instance
pub struct AcmeDnsClient {
    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client carrying the TLS configuration
    client: reqwest::Client,
}

// Custom Debug implementation that hides TLS internals
impl std::fmt::Debug for AcmeDnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeDnsClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AcmeDnsClient {
    /// Create a client from the resolved configuration
    ///
    /// # Errors
    ///
    /// `Error::Config` if TLS material cannot be read or parsed, or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_tls(&config.acmedns_url, &config.tls())
    }

    /// Create a client for `base_url` with explicit TLS settings
    pub fn with_tls(base_url: &str, tls: &TlsConfig) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("acme-dns URL cannot be empty"));
        }

        let client = build_http_client(tls)?;
        Ok(Self { base_url, client })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Build the reqwest client for the given TLS settings
fn build_http_client(tls: &TlsConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(DEFAULT_CONNECT_TIMEOUT);

    if let Some(ref identity) = tls.client_identity {
        let mut pem = std::fs::read(&identity.cert_path).map_err(|e| {
            Error::config(format!(
                "Failed to read mTLS client certificate {}: {}",
                identity.cert_path.display(),
                e
            ))
        })?;
        let key = std::fs::read(&identity.key_path).map_err(|e| {
            Error::config(format!(
                "Failed to read mTLS client key {}: {}",
                identity.key_path.display(),
                e
            ))
        })?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);

        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| Error::config(format!("Failed to create client identity: {}", e)))?;
        tracing::debug!("Presenting mTLS client certificate");
        builder = builder.identity(identity);
    }

    if let Some(ref ca_path) = tls.server_ca_path {
        let ca = std::fs::read(ca_path).map_err(|e| {
            Error::config(format!(
                "Failed to read server certificate {}: {}",
                ca_path.display(),
                e
            ))
        })?;
        let cert = reqwest::Certificate::from_pem(&ca)
            .map_err(|e| Error::config(format!("Failed to parse server certificate: {}", e)))?;
        builder = builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(cert);

        if tls.skip_verify {
            tracing::warn!(
                "Custom server certificate configured; ignoring skip-verify setting"
            );
        }
    } else if tls.skip_verify {
        tracing::warn!("Server certificate verification is DISABLED");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Render the update request for diagnostics, with the API key redacted
fn render_update_request(account: &Account, body: &UpdateRequest<'_>) -> String {
    let headers: BTreeMap<&str, &str> = [
        ("Content-Type", "application/json"),
        (HEADER_API_KEY, REDACTED),
        (HEADER_API_USER, account.username.as_str()),
    ]
    .into_iter()
    .collect();

    let headers = serde_json::to_string_pretty(&headers).unwrap_or_default();
    let body = serde_json::to_value(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_default();

    format!(
        "------- Request headers:\n{}\n------- Request body:\n{}",
        headers, body
    )
}

/// Pretty-print a response body when it is JSON, otherwise return it as is
fn render_response_body(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_string())
}

/// Placeholder body for an error response that could not be read
fn unreadable_body(e: &reqwest::Error) -> String {
    format!("Unable to read error response: {}", e)
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> Error {
    Error::transport(format!("POST {} failed: {}", endpoint, e))
}

#[async_trait]
impl AcmeDnsApi for AcmeDnsClient {
    /// Register a new account
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /register
    /// Content-Type: application/json
    ///
    /// {"allowfrom": ["192.168.100.1/24"]}
    /// ```
    async fn register(&self, allow_from: &[String]) -> Result<Account> {
        let url = self.endpoint("register");
        tracing::debug!("Registering account at {}", url);

        let mut request = self.client.post(&url);
        if let Some(body) = registration_body(allow_from) {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if status != StatusCode::CREATED {
            return Err(Error::Registration {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::protocol(format!(
                "Registration succeeded but the response could not be parsed: {}. Response body: {}",
                e, text
            ))
        })
    }

    /// Publish a TXT token
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /update
    /// X-Api-User: <username>
    /// X-Api-Key: <password>
    /// Content-Type: application/json
    ///
    /// {"subdomain": "<subdomain>", "txt": "<token>"}
    /// ```
    async fn update_txt(&self, account: &Account, txt: &str) -> Result<()> {
        let url = self.endpoint("update");
        let body = UpdateRequest {
            subdomain: &account.subdomain,
            txt,
        };

        tracing::debug!("Updating TXT record for subdomain {}", account.subdomain);

        let response = self
            .client
            .post(&url)
            .header(HEADER_API_USER, &account.username)
            .header(HEADER_API_KEY, &account.password)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|e| unreadable_body(&e));

        Err(Error::Update {
            request: render_update_request(account, &body),
            status: status.as_u16(),
            body: render_response_body(&text),
        })
    }

    fn api_name(&self) -> &'static str {
        "acme-dns"
    }
}
