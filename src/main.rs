//! forge - platform detection and authentication for Git forges
//!
//! Validates the platforms configuration, resolves repository URLs to a
//! configured platform, and logs in to it.
//!
//! Available as the `forge` command.

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forge_auth::cli::commands::{Cli, Commands};
use forge_auth::cli::{auth, config_path, detect, validate};
use forge_auth::core::config::{ConfigurationDocument, LogFormat};
use forge_auth::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.config.as_deref());

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging
///
/// Priority for the filter: `RUST_LOG` > `global.logging.level` > "warn"
fn init_logging(explicit: Option<&Path>) {
    let logging = config_path(explicit)
        .ok()
        .filter(|path| path.exists())
        .and_then(|path| ConfigurationDocument::load_from(&path).ok())
        .and_then(|doc| doc.logging().cloned());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("warn");
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.and_then(|l| l.format) {
        Some(LogFormat::Json) => builder.json().init(),
        Some(LogFormat::Compact) => builder.compact().init(),
        Some(LogFormat::Pretty) => builder.pretty().init(),
        None => builder.init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate => validate::handle_validate(&path),
        Commands::Detect { url } => detect::handle_detect(&path, &url),
        Commands::Auth(args) => auth::handle_auth(&path, args.command).await,
    }
}
