//! `forge detect` handler

use std::path::Path;

use crate::cli::load_valid_document;
use crate::core::detection::PlatformDetector;
use crate::error::Result;

/// Print what the URL looks like and which configured platform it resolves to
pub fn handle_detect(path: &Path, url: &str) -> Result<()> {
    let detected = PlatformDetector::detect_type(url);

    println!("URL:          {}", url);
    println!(
        "Type:         {}",
        detected.map_or("unknown".to_string(), |t| t.to_string())
    );
    println!(
        "Base URL:     {}",
        PlatformDetector::extract_base_url(url).unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Repository:   {}",
        PlatformDetector::extract_repository_path(url).unwrap_or_else(|| "-".to_string())
    );
    if let Some(platform) = detected {
        println!(
            "Self-hosted:  {}",
            if PlatformDetector::is_self_hosted(url, platform) {
                "yes"
            } else {
                "no"
            }
        );
    }

    let doc = load_valid_document(path)?;
    let entry = doc.resolve(url)?;
    println!("Platform:     {} ({})", entry.name, entry.auth.method.tag());
    Ok(())
}
