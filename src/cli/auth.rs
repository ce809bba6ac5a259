//! Authentication CLI command handlers

use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::cli::commands::AuthCommand;
use crate::cli::load_valid_document;
use crate::core::config::{ConfigurationDocument, PlatformEntry};
use crate::core::credentials::{
    CredentialVault, KeyringCredentialStore, MemoryCredentialStore, SecretCipher,
};
use crate::core::secret::mask_secret;
use crate::core::token_manager::{AuthOutcome, AuthenticationManager};
use crate::error::{ForgeError, Result};
use crate::transport::ReqwestTransport;

/// Handle authentication commands
pub async fn handle_auth(path: &Path, command: AuthCommand) -> Result<()> {
    let doc = load_valid_document(path)?;

    let named = match &command {
        AuthCommand::Login { platform } | AuthCommand::Logout { platform } => Some(platform.as_str()),
        AuthCommand::Status { platform } => platform.as_deref(),
    };
    if let Some(name) = named {
        find_entry(&doc, name)?;
    }
    let vault = vault_for(&command)?;

    match command {
        AuthCommand::Login { platform } => handle_login(&doc, &vault, &platform).await,
        AuthCommand::Logout { platform } => handle_logout(&doc, &vault, &platform),
        AuthCommand::Status { platform } => handle_status(&doc, &vault, platform.as_deref()),
    }
}

/// Vault over the system keyring
///
/// Only login may create the master key. Logout just deletes entries, and
/// status falls back to an empty in-memory vault when no key exists yet.
fn vault_for(command: &AuthCommand) -> Result<CredentialVault> {
    let keyring = Arc::new(KeyringCredentialStore);
    match command {
        AuthCommand::Login { .. } => Ok(CredentialVault::new(
            keyring,
            SecretCipher::from_env_or_keyring()?,
        )),
        AuthCommand::Logout { .. } => {
            let cipher = SecretCipher::existing()?.unwrap_or_else(SecretCipher::generate);
            Ok(CredentialVault::new(keyring, cipher))
        }
        AuthCommand::Status { .. } => Ok(match SecretCipher::existing() {
            Ok(Some(cipher)) => CredentialVault::new(keyring, cipher),
            Ok(None) => read_only_vault(),
            Err(e) => {
                warn!(error = %e, "Vault master key unavailable; only configured secrets are checked");
                read_only_vault()
            }
        }),
    }
}

fn read_only_vault() -> CredentialVault {
    CredentialVault::new(Arc::new(MemoryCredentialStore::new()), SecretCipher::generate())
}

/// Build the manager for one entry
fn manager_for(
    doc: &ConfigurationDocument,
    entry: &PlatformEntry,
    vault: &CredentialVault,
) -> Result<AuthenticationManager> {
    let transport = ReqwestTransport::for_entry(entry, doc.global.as_ref())?;
    Ok(AuthenticationManager::new(entry.clone(), Arc::new(transport), vault.clone())
        .with_global(doc.global.as_ref()))
}

fn find_entry<'a>(doc: &'a ConfigurationDocument, name: &str) -> Result<&'a PlatformEntry> {
    doc.platform(name)
        .ok_or_else(|| ForgeError::UnknownPlatform(name.to_string()))
}

/// Cancel on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Handle the login command
async fn handle_login(doc: &ConfigurationDocument, vault: &CredentialVault, name: &str) -> Result<()> {
    let entry = find_entry(doc, name)?;
    let manager = manager_for(doc, entry, vault)?;
    let cancel = interrupt_token();

    println!(
        "Authenticating with {} ({})...",
        entry.name,
        entry.auth.method.tag()
    );

    match manager.authenticate(&cancel).await? {
        AuthOutcome::Token(token) => {
            println!("\n✓ Successfully authenticated with {}!", entry.name);
            print_token(&token);
        }
        AuthOutcome::SshKey(identity) => {
            println!("\n✓ SSH key is ready for {}.", entry.name);
            if let Some(key_type) = identity.key_type {
                println!("  Key type: {:?}", key_type);
            }
            println!("  The server checks the key on first use.");
        }
        AuthOutcome::AuthorizationRequired { url } => {
            println!();
            println!("Open this URL in your browser:");
            println!("  {}", url);
            println!();

            if open_browser(&url) {
                println!("✓ Browser opened automatically.");
                println!();
            }

            print!("After authorizing, paste the full callback URL here: ");
            io::stdout().flush()?;

            let mut callback = String::new();
            io::stdin().read_line(&mut callback)?;
            let (code, state) = parse_callback(callback.trim())?;

            let token = manager.complete_oauth(&code, &state, &cancel).await?;
            println!("\n✓ Successfully authenticated with {}!", entry.name);
            print_token(&token);
        }
    }
    Ok(())
}

fn print_token(token: &crate::auth::AuthToken) {
    println!("  Token: {}", mask_secret(&token.access_token));
    if !token.scopes.is_empty() {
        println!("  Scopes: {}", token.scopes.join(", "));
    }
    match token.expires_at() {
        Some(expires_at) => {
            let remaining = expires_at.signed_duration_since(Utc::now());
            let hours = remaining.num_hours();
            let minutes = remaining.num_minutes() % 60;
            if hours > 0 {
                println!("  Token expires in: {}h {}m", hours, minutes);
            } else {
                println!("  Token expires in: {}m", minutes.max(0));
            }
        }
        None => println!("  Token does not expire"),
    }
}

/// Pull `code` and `state` out of a pasted callback URL
fn parse_callback(callback: &str) -> Result<(String, String)> {
    let url = Url::parse(callback)
        .map_err(|e| ForgeError::Config(format!("Invalid callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(crate::error::AuthError::Rejected(error).into());
    }
    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(ForgeError::Config(
            "Callback URL must contain both 'code' and 'state'".to_string(),
        )),
    }
}

/// Try to open a URL in the default browser
fn open_browser(url: &str) -> bool {
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn().is_ok()
    }

    #[cfg(target_os = "linux")]
    {
        Command::new("xdg-open").arg(url).spawn().is_ok()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = url;
        false
    }
}

/// Handle the logout command
fn handle_logout(doc: &ConfigurationDocument, vault: &CredentialVault, name: &str) -> Result<()> {
    let entry = find_entry(doc, name)?;
    let manager = manager_for(doc, entry, vault)?;
    manager.logout()?;
    println!("Successfully logged out of {}.", entry.name);
    Ok(())
}

/// Handle the status command
fn handle_status(
    doc: &ConfigurationDocument,
    vault: &CredentialVault,
    name: Option<&str>,
) -> Result<()> {
    let entries: Vec<&PlatformEntry> = match name {
        Some(name) => vec![find_entry(doc, name)?],
        None => doc.platforms.iter().collect(),
    };

    println!("Authentication Status:");
    for entry in entries {
        let manager = manager_for(doc, entry, vault)?;
        println!(
            "  {} ({}, {}): {}",
            entry.name,
            entry.platform_type(),
            entry.auth.method.tag(),
            if manager.has_credentials() {
                "Credentials available"
            } else {
                "Not authenticated"
            }
        );
    }
    Ok(())
}
