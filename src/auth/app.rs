//! GitHub App authentication
//!
//! Signs a short-lived App JWT with the app's private key and exchanges it
//! for an installation access token. Re-running the exchange is how App
//! tokens are renewed.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::token::AuthToken;
use crate::auth::FlowContext;
use crate::core::config::{AppAuth, PlatformType};
use crate::error::{AuthError, ForgeError, Result};
use crate::transport::{HttpRequest, HttpResponse};

/// GitHub rejects App JWTs living longer than ten minutes
const JWT_LIFETIME_SECS: i64 = 600;
/// Backdate `iat` to tolerate clock drift
const JWT_BACKDATE_SECS: i64 = 60;

/// GitHub App JWT claims
#[derive(Debug, Serialize, Deserialize)]
struct AppJwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Installation token response from GitHub
#[derive(Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Installation {
    id: u64,
}

/// Sign an App JWT valid from `now - 60s` to `now + 600s`
pub fn sign_app_jwt(app_id: &str, private_key: &SecretString, now_secs: i64) -> Result<String> {
    let claims = AppJwtClaims {
        iat: now_secs - JWT_BACKDATE_SECS,
        exp: now_secs + JWT_LIFETIME_SECS,
        iss: app_id.to_string(),
    };

    let key = EncodingKey::from_rsa_pem(private_key.expose_secret().as_bytes())
        .map_err(|e| AuthError::InvalidFormat(format!("invalid App private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| AuthError::InvalidFormat(format!("failed to sign App JWT: {}", e)).into())
}

/// Mint an installation token for the configured installation
///
/// Without a configured installation id, the app must have exactly one
/// installation.
pub async fn issue_installation_token(
    ctx: &FlowContext<'_>,
    config: &AppAuth,
    private_key: &SecretString,
) -> Result<AuthToken> {
    if ctx.entry.platform_type() != PlatformType::Github {
        return Err(AuthError::Unsupported(format!(
            "App authentication is only available on GitHub, not {}",
            ctx.entry.platform_type().display_name()
        ))
        .into());
    }

    let app_id = config
        .app_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ForgeError::Config("App configuration is missing 'app_id'".into()))?;

    let now = ctx.clock.now();
    let jwt = sign_app_jwt(app_id, private_key, now.timestamp())?;
    let api = ctx.entry.api_base_url();

    let installation_id = match config.installation_id {
        Some(id) => id,
        None => find_single_installation(ctx, &api, &jwt).await?,
    };

    let url = format!("{}/app/installations/{}/access_tokens", api, installation_id);
    let request = app_request(ctx, HttpRequest::post(url, ctx.timeout), &jwt)
        .json(&serde_json::json!({}));
    let response = ctx.send("Installation token exchange", request).await?;

    if response.status != 201 {
        return Err(rejected("installation token exchange", &response));
    }

    let issued: InstallationTokenResponse = response.json()?;
    debug!(installation_id, expires_at = %issued.expires_at, "Issued installation token");

    let mut token = AuthToken::new(SecretString::from(issued.token), now);
    token.token_type = "token".to_string();
    token.expires_in_seconds = Some((issued.expires_at - now).num_seconds().max(0) as u64);
    Ok(token)
}

async fn find_single_installation(ctx: &FlowContext<'_>, api: &str, jwt: &str) -> Result<u64> {
    let url = format!("{}/app/installations", api);
    let request = app_request(ctx, HttpRequest::get(url, ctx.timeout), jwt);
    let response = ctx.send("Installation lookup", request).await?;

    if response.status != 200 {
        return Err(rejected("installation lookup", &response));
    }

    let installations: Vec<Installation> = response.json()?;
    match installations.as_slice() {
        [only] => Ok(only.id),
        [] => Err(AuthError::Rejected("the App has no installations".into()).into()),
        many => Err(ForgeError::Config(format!(
            "the App has {} installations; set 'installation_id'",
            many.len()
        ))),
    }
}

fn app_request(ctx: &FlowContext<'_>, request: HttpRequest, jwt: &str) -> HttpRequest {
    ctx.request(request)
        .header("Authorization", format!("Bearer {}", jwt))
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
}

fn rejected(operation: &str, response: &HttpResponse) -> ForgeError {
    AuthError::Rejected(format!(
        "{} failed with HTTP {}: {}",
        operation,
        response.status,
        response.text()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/app_key.pem");
    const TEST_TIMESTAMP: i64 = 1706900000;

    fn key() -> SecretString {
        SecretString::from(TEST_PRIVATE_KEY.to_string())
    }

    #[test]
    fn test_app_jwt_claims() {
        let jwt = sign_app_jwt("12345", &key(), TEST_TIMESTAMP).unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["iss"], "12345");
        assert_eq!(claims["iat"].as_i64().unwrap(), TEST_TIMESTAMP - 60);
        assert_eq!(claims["exp"].as_i64().unwrap(), TEST_TIMESTAMP + 600);
    }

    #[test]
    fn test_invalid_key_is_invalid_format() {
        let err = sign_app_jwt("12345", &SecretString::from("invalid-key"), TEST_TIMESTAMP)
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::Authentication(AuthError::InvalidFormat(_))
        ));
    }
}
