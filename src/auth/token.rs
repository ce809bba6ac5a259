//! Issued access tokens

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// An access token issued by a platform
///
/// Absence of `expires_in_seconds` means the token does not expire.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub access_token: SecretString,
    /// Usually "bearer"
    pub token_type: String,
    pub refresh_token: Option<SecretString>,
    pub issued_at: DateTime<Utc>,
    pub expires_in_seconds: Option<u64>,
    /// Scopes granted, when the platform reports them
    pub scopes: Vec<String>,
}

impl AuthToken {
    pub fn new(access_token: SecretString, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            refresh_token: None,
            issued_at,
            expires_in_seconds: None,
            scopes: Vec::new(),
        }
    }

    /// Absolute expiry, if any
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in_seconds
            .map(|secs| self.issued_at + Duration::seconds(secs.min(i64::MAX as u64) as i64))
    }

    /// Whether the token is expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Standard OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    pub fn into_token(self, issued_at: DateTime<Utc>) -> AuthToken {
        AuthToken {
            access_token: SecretString::from(self.access_token),
            token_type: self.token_type,
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            issued_at,
            expires_in_seconds: self.expires_in,
            scopes: self.scope.as_deref().map(split_scopes).unwrap_or_default(),
        }
    }
}

/// Error body from an OAuth2 endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{} ({})", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Split a scope list separated by commas and/or spaces
pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundaries() {
        let issued = Utc::now();
        let mut token = AuthToken::new(SecretString::from("t"), issued);
        token.expires_in_seconds = Some(3600);

        assert!(!token.is_expired(issued + Duration::seconds(1800)));
        assert!(token.is_expired(issued + Duration::seconds(3600)));
        assert!(token.is_expired(issued + Duration::seconds(3601)));
    }

    #[test]
    fn test_non_expiring_token() {
        let issued = Utc::now();
        let token = AuthToken::new(SecretString::from("t"), issued);
        assert!(!token.is_expired(issued + Duration::days(3650)));
        assert!(token.expires_at().is_none());
    }

    #[test]
    fn test_token_response_conversion() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","scope":"repo,read:org","expires_in":28800,"refresh_token":""}"#,
        )
        .unwrap();
        let token = response.into_token(Utc::now());
        assert_eq!(token.scopes, vec!["repo", "read:org"]);
        assert_eq!(token.expires_in_seconds, Some(28800));
        assert!(!token.can_refresh());
    }

    #[test]
    fn test_split_scopes() {
        assert_eq!(split_scopes("repo, read:org  gist"), vec!["repo", "read:org", "gist"]);
        assert!(split_scopes("").is_empty());
    }
}
