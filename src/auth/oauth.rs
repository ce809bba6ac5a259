//! OAuth2 authorization code flow
//!
//! Phase one builds the authorization URL with a random state token; phase
//! two checks the returned state and exchanges the code for tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::auth::token::{AuthToken, ErrorResponse, TokenResponse};
use crate::auth::FlowContext;
use crate::core::config::{OAuth2Auth, PlatformEntry, PlatformType};
use crate::error::{AuthError, ForgeError, Result};
use crate::transport::HttpRequest;

/// Random bytes in a state token; encodes to 43 characters
const STATE_BYTES: usize = 32;

/// An authorization request waiting for its callback
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub authorization_url: String,
    pub created_at: DateTime<Utc>,
}

/// Generate a random state parameter for CSRF protection
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare without short-circuiting on the first differing byte
pub fn states_match(expected: &str, returned: &str) -> bool {
    let (a, b) = (expected.as_bytes(), returned.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn default_authorize_url(entry: &PlatformEntry) -> String {
    let base = entry.base_url.trim_end_matches('/');
    match entry.platform_type() {
        PlatformType::Gitlab => format!("{}/oauth/authorize", base),
        PlatformType::Github | PlatformType::Gitea | PlatformType::Forgejo => {
            format!("{}/login/oauth/authorize", base)
        }
    }
}

fn default_token_url(entry: &PlatformEntry) -> String {
    let base = entry.base_url.trim_end_matches('/');
    match entry.platform_type() {
        PlatformType::Gitlab => format!("{}/oauth/token", base),
        PlatformType::Github | PlatformType::Gitea | PlatformType::Forgejo => {
            format!("{}/login/oauth/access_token", base)
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ForgeError::Config(format!("OAuth2 configuration is missing '{}'", field)))
}

/// Build the authorization URL for a fresh state token
pub fn build_authorization(
    entry: &PlatformEntry,
    config: &OAuth2Auth,
    now: DateTime<Utc>,
) -> Result<PendingAuthorization> {
    let client_id = required(config.client_id.as_deref(), "client_id")?;
    let redirect_uri = required(config.redirect_uri.as_deref(), "redirect_uri")?;
    let endpoint = config
        .authorize_url
        .clone()
        .unwrap_or_else(|| default_authorize_url(entry));

    let state = generate_state();
    let mut url = Url::parse(&endpoint)
        .map_err(|e| ForgeError::Config(format!("Invalid authorization endpoint: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scopes.clone().unwrap_or_default().join(" "))
        .append_pair("state", &state);

    Ok(PendingAuthorization {
        state,
        authorization_url: url.to_string(),
        created_at: now,
    })
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    ctx: &FlowContext<'_>,
    config: &OAuth2Auth,
    client_secret: &SecretString,
    code: &str,
) -> Result<AuthToken> {
    let client_id = required(config.client_id.as_deref(), "client_id")?;
    let redirect_uri = required(config.redirect_uri.as_deref(), "redirect_uri")?;
    let endpoint = config
        .token_url
        .clone()
        .unwrap_or_else(|| default_token_url(ctx.entry));

    let request = ctx.request(HttpRequest::post(endpoint, ctx.timeout)).form(&[
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client_id),
        ("client_secret", client_secret.expose_secret()),
    ]);
    let response = ctx.send("Authorization code exchange", request).await?;

    parse_token_response(ctx.clock.now(), response.status, &response.body)
        .map_err(|reason| ForgeError::from(AuthError::Rejected(reason)))
}

/// Trade a refresh token for a new token pair
///
/// Keeps the old refresh token when the platform does not rotate it.
pub async fn refresh(
    ctx: &FlowContext<'_>,
    config: &OAuth2Auth,
    client_secret: &SecretString,
    refresh_token: &SecretString,
) -> Result<AuthToken> {
    let client_id = required(config.client_id.as_deref(), "client_id")?;
    let endpoint = config
        .token_url
        .clone()
        .unwrap_or_else(|| default_token_url(ctx.entry));

    let request = ctx.request(HttpRequest::post(endpoint, ctx.timeout)).form(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.expose_secret()),
        ("client_id", client_id),
        ("client_secret", client_secret.expose_secret()),
    ]);
    let response = ctx.send("Token refresh", request).await?;

    let mut token = parse_token_response(ctx.clock.now(), response.status, &response.body)
        .map_err(ForgeError::Refresh)?;
    if token.refresh_token.is_none() {
        token.refresh_token = Some(refresh_token.clone());
    }
    Ok(token)
}

/// Interpret a token endpoint response
///
/// GitHub answers errors with HTTP 200 and an `error` field, so the body is
/// inspected before the status.
fn parse_token_response(
    now: DateTime<Utc>,
    status: u16,
    body: &[u8],
) -> std::result::Result<AuthToken, String> {
    if let Ok(token) = serde_json::from_slice::<TokenResponse>(body) {
        if (200..300).contains(&status) {
            return Ok(token.into_token(now));
        }
    }
    if let Ok(error) = serde_json::from_slice::<ErrorResponse>(body) {
        return Err(error.to_string());
    }
    Err(format!("unexpected HTTP {} from token endpoint", status))
}
