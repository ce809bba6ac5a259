//! Secret indirection
//!
//! Each secret-bearing field comes as a pair: a literal value and the name of
//! an environment variable. The environment variable wins when it is set and
//! non-empty, so credentials can be rotated without editing the config file.
//!
//! Priority: env var > literal > (caller's fallback, usually the vault)

use secrecy::{ExposeSecret, SecretString};

use crate::core::clock::Environment;

/// A literal/env-var pair for one secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecretSource<'a> {
    pub literal: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn new(literal: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self { literal, env_var }
    }

    /// Whether either form is declared at all
    pub fn is_declared(&self) -> bool {
        self.literal.is_some_and(|v| !v.trim().is_empty())
            || self.env_var.is_some_and(|v| !v.trim().is_empty())
    }

    /// Resolve the secret value
    ///
    /// Returns `None` when neither the variable nor the literal yields a
    /// non-empty value.
    pub fn resolve(&self, env: &dyn Environment) -> Option<SecretString> {
        // Priority 1: environment variable
        if let Some(name) = self.env_var.filter(|n| !n.trim().is_empty()) {
            if let Some(value) = env.var(name.trim()) {
                if !value.is_empty() {
                    return Some(SecretString::from(value));
                }
            }
        }

        // Priority 2: literal value
        self.literal
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_string()))
    }
}

/// Get a masked version of a secret for display (shows first 4 and last 4 chars)
pub fn mask_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret();
    let chars: Vec<char> = exposed.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
