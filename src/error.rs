//! Custom error types for forge-auth
//!
//! User-friendly error messages for every failure the library can surface.
//! Validation problems are not errors: they are collected as
//! [`ValidationError`](crate::core::validation::ValidationError) values and
//! only wrapped here by the "load and validate" convenience entry point.

use std::time::Duration;

use thiserror::Error;

use crate::core::validation::ValidationError;
use crate::transport::TransportError;

/// Main error type for forge-auth
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The configuration document has one or more violations
    #[error("Configuration is invalid ({} problem(s)):\n{}", .0.len(), format_violations(.0))]
    Invalid(Vec<ValidationError>),

    /// No configured platform applies to the URL
    #[error("No configured platform matches '{0}'.\n\n  → Add a platform entry for this host, or set 'default_platform'.")]
    PlatformUnresolved(String),

    /// No platform entry has the given name
    #[error("Platform '{0}' is not configured.\n\n  → Run 'forge validate' to list the configured platforms.")]
    UnknownPlatform(String),

    /// No session has been established yet
    #[error("Not authenticated with '{0}'.\n\n  → Run 'forge auth login --platform {0}' to authenticate.")]
    NotAuthenticated(String),

    /// Authentication failed
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// OAuth2 callback carried a state value we did not issue
    #[error("OAuth2 state mismatch: the callback was not produced by this authorization request.\n\n  → Start the login again; do not reuse old callback URLs.")]
    StateMismatch,

    /// Token refresh is impossible or failed
    #[error("Failed to refresh token: {0}\n\n  → Run 'forge auth login' to re-authenticate.")]
    Refresh(String),

    /// Credential storage fault
    #[error("Cannot access secure storage: {0}\n\n  → On macOS: Make sure Keychain Access is available.\n  → On Linux: Ensure a secret service (like gnome-keyring) is running.")]
    CredentialStore(String),

    /// A stored credential could not be decoded
    #[error("Stored credential is corrupted: {0}")]
    CorruptedCredential(String),

    /// A network call exceeded its deadline
    #[error("{operation} timed out after {}s.\n\n  → Check your network connection or raise 'timeout_secs'.", .after.as_secs())]
    Timeout {
        /// What was being attempted
        operation: &'static str,
        /// The deadline that elapsed
        after: Duration,
    },

    /// The caller cancelled an in-flight authentication attempt
    #[error("Operation cancelled.")]
    Cancelled,

    /// HTTP transport failure other than a timeout
    #[error("Network request failed: {0}\n\n  → Check your internet connection.")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),
}

/// Authentication failures, by kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Secret or key material is malformed
    #[error("Credential has an invalid format: {0}")]
    InvalidFormat(String),

    /// The token is valid but lacks required scopes
    #[error("Token is missing required scopes: {}\n\n  → Create a token that grants these scopes.", .missing.join(", "))]
    ScopeInsufficient {
        /// Required scopes not covered by the granted ones
        missing: Vec<String>,
    },

    /// The credential expired and cannot be renewed
    #[error("Credential has expired.\n\n  → Run 'forge auth login' to authenticate again.")]
    Expired,

    /// The platform refused the credential
    #[error("Authentication was rejected: {0}")]
    Rejected(String),

    /// No secret could be resolved from config, environment or the vault
    #[error("No credential available for '{0}'.\n\n  → Set the secret or its environment variable in the platform's auth block.")]
    MissingCredential(String),

    /// The method is not available for this platform type
    #[error("{0}")]
    Unsupported(String),
}

impl From<keyring::Error> for ForgeError {
    fn from(err: keyring::Error) -> Self {
        ForgeError::CredentialStore(err.to_string())
    }
}

impl From<toml::de::Error> for ForgeError {
    fn from(err: toml::de::Error) -> Self {
        ForgeError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for ForgeError {
    fn from(err: toml::ser::Error) -> Self {
        ForgeError::Toml(err.to_string())
    }
}

impl From<TransportError> for ForgeError {
    fn from(err: TransportError) -> Self {
        ForgeError::Transport(err.to_string())
    }
}

fn format_violations(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias using ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;
