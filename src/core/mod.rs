//! Core functionality for forge-auth
//!
//! This module contains the shared business logic:
//! - Configuration model and document loading
//! - Configuration validation
//! - Platform detection from repository and API URLs
//! - Secret indirection and encrypted credential persistence
//! - Authentication lifecycle management

pub mod clock;
pub mod config;
pub mod credentials;
pub mod detection;
pub mod secret;
pub mod token_manager;
pub mod validation;

pub use config::{ConfigurationDocument, PlatformEntry, PlatformType};
pub use credentials::{CredentialStore, CredentialVault};
pub use detection::PlatformDetector;
pub use token_manager::{AuthOutcome, AuthState, AuthenticationManager};
pub use validation::{ConfigValidator, ValidationError};
