//! CLI module for forge-auth
//!
//! This module contains all CLI command definitions and handlers using clap.

pub mod auth;
pub mod commands;
pub mod detect;
pub mod validate;

pub use commands::{Cli, Commands};

use std::path::{Path, PathBuf};

use crate::core::config::ConfigurationDocument;
use crate::core::validation::ConfigValidator;
use crate::error::{ForgeError, Result};

/// The `--config` path, else the per-user default location
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => ConfigurationDocument::default_path(),
    }
}

/// Load the document, with a hint when the file does not exist
pub fn load_document(path: &Path) -> Result<ConfigurationDocument> {
    if !path.exists() {
        return Err(ForgeError::Config(format!(
            "{} does not exist.\n\n  → Create it or pass --config <PATH>.",
            path.display()
        )));
    }
    ConfigurationDocument::load_from(path)
}

/// Load the document and refuse to use it when it has any violation
pub fn load_valid_document(path: &Path) -> Result<ConfigurationDocument> {
    let doc = load_document(path)?;
    let violations = ConfigValidator::validate_document(&doc);
    if !violations.is_empty() {
        return Err(ForgeError::Invalid(violations));
    }
    Ok(doc)
}
