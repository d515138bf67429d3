//! Error types for the acme-dns hook
//!
//! Every failure in this crate is fatal for the current run. Components
//! return these values; only the binary prints them and picks an exit code.

use thiserror::Error;

/// Result type alias for hook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the acme-dns hook
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration / invocation input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input passed to a library call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage file exists and is non-empty but cannot be parsed
    #[error("Storage JSON is corrupted: {0}")]
    StorageCorrupt(String),

    /// Credential store I/O errors (writing the storage file)
    #[error("Credential store error: {0}")]
    StateStore(String),

    /// Account registration rejected by the remote service
    #[error(
        "Encountered an error while trying to register a new acme-dns account. \
         HTTP status {status}, Response body: {body}"
    )]
    Registration {
        /// HTTP status code returned by `/register`
        status: u16,
        /// Raw response body
        body: String,
    },

    /// TXT update rejected by the remote service
    #[error(
        "Encountered an error while trying to update TXT record in acme-dns.\n\
         {request}\n\
         ------- Response HTTP status: {status}\n\
         ------- Response body: {body}"
    )]
    Update {
        /// Rendered outgoing request (headers and body)
        request: String,
        /// HTTP status code returned by `/update`
        status: u16,
        /// Response body, pretty-printed when it is JSON
        body: String,
    },

    /// Remote service answered with a success status but an unusable body
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection or TLS failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unclassified I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a storage corruption error
    pub fn storage_corrupt(msg: impl Into<String>) -> Self {
        Self::StorageCorrupt(msg.into())
    }

    /// Create a credential store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether this error is raised before any network call is made
    ///
    /// Configuration and local storage problems fall in this class; remote
    /// status, protocol and transport failures do not.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidInput(_)
                | Self::StorageCorrupt(_)
                | Self::StateStore(_)
                | Self::Io(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
