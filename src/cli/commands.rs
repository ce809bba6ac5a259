//! CLI command definitions using clap
//!
//! Defines the command structure for the `forge` CLI tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// forge - platform detection and authentication for Git forges
///
/// Validates the platforms configuration, resolves repository URLs to a
/// configured platform, and manages stored credentials.
#[derive(Parser, Debug)]
#[command(name = "forge", version, about, long_about = None)]
pub struct Cli {
    /// Path to the platforms configuration file
    #[arg(long, short, global = true, env = "FORGE_AUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the configuration file and report every problem
    Validate,

    /// Show which platform a repository or API URL belongs to
    Detect {
        /// Repository, remote or API URL
        url: String,
    },

    /// Manage authentication for a configured platform
    Auth(AuthArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication commands
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Authenticate with a platform using its configured method
    Login {
        /// Platform entry name
        #[arg(long, short)]
        platform: String,
    },
    /// Logout and remove stored credentials
    Logout {
        /// Platform entry name
        #[arg(long, short)]
        platform: String,
    },
    /// Show authentication status
    Status {
        /// Platform entry name (all platforms when omitted)
        #[arg(long, short)]
        platform: Option<String>,
    },
}
