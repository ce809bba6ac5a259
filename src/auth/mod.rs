//! Per-method authentication flows
//!
//! This module provides the network and key-handling steps for each
//! authentication method:
//! - Personal access tokens (format check + identity call)
//! - OAuth2 authorization code flow (state token + code exchange + refresh)
//! - GitHub App installation tokens (signed JWT + token exchange)
//! - SSH keys (local key material only)
//!
//! Lifecycle and state live in [`crate::core::token_manager`].

pub mod app;
pub mod oauth;
pub mod pat;
pub mod ssh;
pub mod token;

pub use oauth::PendingAuthorization;
pub use ssh::SshIdentity;
pub use token::AuthToken;

use std::time::Duration;

use crate::core::clock::Clock;
use crate::core::config::PlatformEntry;
use crate::error::{ForgeError, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Everything a flow needs to talk to one platform
pub struct FlowContext<'a> {
    pub entry: &'a PlatformEntry,
    pub transport: &'a dyn HttpTransport,
    pub clock: &'a dyn Clock,
    pub timeout: Duration,
}

impl<'a> FlowContext<'a> {
    /// Start a request with the entry's and auth block's extra headers
    pub fn request(&self, request: HttpRequest) -> HttpRequest {
        let mut request = request.header("Accept", "application/json");
        if let Some(headers) = &self.entry.headers {
            request = request.headers(headers);
        }
        if let Some(headers) = &self.entry.auth.headers {
            request = request.headers(headers);
        }
        request
    }

    /// Send a request under the flow timeout
    ///
    /// The deadline is enforced here as well as in the transport, so a
    /// transport that ignores `HttpRequest::timeout` still cannot hang us.
    pub async fn send(&self, operation: &'static str, request: HttpRequest) -> Result<HttpResponse> {
        let timeout = self.timeout;
        tracing::debug!(operation, url = %request.url, "Sending authentication request");
        match tokio::time::timeout(timeout, self.transport.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Timeout)) | Err(_) => Err(ForgeError::Timeout {
                operation,
                after: timeout,
            }),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}
