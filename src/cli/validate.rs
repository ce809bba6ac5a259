//! `forge validate` handler

use std::path::Path;

use crate::cli::load_valid_document;
use crate::error::Result;

/// Validate the configuration file
///
/// Every violation is reported in one pass; any violation fails the command.
pub fn handle_validate(path: &Path) -> Result<()> {
    let doc = load_valid_document(path)?;

    println!(
        "✓ {} is valid ({} platform(s))",
        path.display(),
        doc.platforms.len()
    );
    for entry in &doc.platforms {
        let default = doc.default_platform.as_deref() == Some(entry.name.as_str());
        println!(
            "  {} [{}] {} (priority {}{}{})",
            entry.name,
            entry.platform_type(),
            entry.base_url,
            entry.priority,
            if entry.enabled { "" } else { ", disabled" },
            if default { ", default" } else { "" },
        );
    }
    Ok(())
}
