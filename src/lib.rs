//! forge-auth - Platform detection and authentication for Git forges
//!
//! This library validates platform configuration documents, works out which
//! configured platform (GitHub, GitLab, Gitea, Forgejo or a self-hosted
//! variant) a repository URL belongs to, and manages the authentication
//! lifecycle for that platform's credential method.

pub mod auth;
pub mod cli;
pub mod core;
pub mod error;
pub mod transport;

pub use error::{AuthError, ForgeError, Result};
