//! Platform detection
//!
//! Classifies repository and API URLs by platform type and resolves them to a
//! configured [`PlatformEntry`]. Every function here fails closed: a URL that
//! cannot be parsed yields `None`, never an error or a panic.
//!
//! Supported remote formats:
//! - `https://github.com/owner/repo.git`
//! - `git@github.com:owner/repo.git`
//! - `ssh://git@github.com/owner/repo.git`

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::core::config::{ConfigurationDocument, PlatformEntry, PlatformType};
use crate::error::{ForgeError, Result};

/// Per-type host patterns, in detection precedence order
static PLATFORM_PATTERNS: Lazy<Vec<(PlatformType, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        (
            PlatformType::Github,
            compile(&[r"(^|[./@])github\.com([:/]|$)", r"(^|[./@])github\.", r"(^|[./@])ghe\."]),
        ),
        (
            PlatformType::Gitlab,
            compile(&[r"(^|[./@])gitlab\.com([:/]|$)", r"(^|[./@])gitlab\."]),
        ),
        (
            PlatformType::Gitea,
            compile(&[r"(^|[./@])gitea\.com([:/]|$)", r"(^|[./@])gitea\."]),
        ),
        (
            PlatformType::Forgejo,
            compile(&[r"(^|[./@])codeberg\.org([:/]|$)", r"(^|[./@])forgejo\."]),
        ),
    ]
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern for platform detection"))
        .collect()
}

/// Path segments that mark an API-style URL
const API_SEGMENTS: &[&str] = &["api", "api.php", "graphql"];

/// Stateless URL classifier
pub struct PlatformDetector;

impl PlatformDetector {
    /// Detect the platform type of a URL from its host
    ///
    /// Types are tried in a fixed order (GitHub, GitLab, Gitea, Forgejo) and
    /// the first one with any matching pattern wins.
    pub fn detect_type(url: &str) -> Option<PlatformType> {
        let normalized = url.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        let host = parse_url(&normalized)
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or(normalized);

        PLATFORM_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&host)))
            .map(|(platform, _)| *platform)
    }

    /// Extract `scheme://host[:port]`
    ///
    /// SSH remotes map to `https://host`, since that is where the platform
    /// itself is served.
    pub fn extract_base_url(url: &str) -> Option<String> {
        let parsed = parse_url(url.trim())?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let scheme = match parsed.scheme() {
            "http" | "https" => parsed.scheme().to_string(),
            "ssh" | "git" | "git+ssh" => "https".to_string(),
            _ => return None,
        };

        let port = if scheme == parsed.scheme() {
            parsed.port()
        } else {
            None
        };

        Some(match port {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        })
    }

    /// Extract the repository path (`owner/repo`)
    ///
    /// For API-style URLs a `repo` or `repository` query parameter takes
    /// precedence over the path.
    pub fn extract_repository_path(url: &str) -> Option<String> {
        let parsed = parse_url(url.trim())?;
        let trimmed = parsed.path().trim_start_matches('/').trim_end_matches('/');
        let path = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let is_api = path
            .split('/')
            .any(|segment| API_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str()))
            || parsed.host_str().is_some_and(|h| h.starts_with("api."));

        if is_api {
            let from_query = parsed
                .query_pairs()
                .find(|(key, value)| (key == "repo" || key == "repository") && !value.is_empty())
                .map(|(_, value)| {
                    value.strip_suffix(".git").unwrap_or(value.as_ref()).to_string()
                });
            if from_query.is_some() {
                return from_query;
            }
        }

        (!path.is_empty()).then(|| path.to_string())
    }

    /// Resolve the entry that best matches a URL
    ///
    /// In order, short-circuiting:
    /// 1. an enabled entry whose base URL equals the URL's base URL
    /// 2. the enabled entry of the detected type with the highest priority
    ///    (first declared wins ties)
    /// 3. the enabled entry named by `default_platform`
    pub fn find_best_match<'a>(
        url: &str,
        entries: &'a [PlatformEntry],
        default_platform: Option<&str>,
    ) -> Option<&'a PlatformEntry> {
        if let Some(base_url) = Self::extract_base_url(url) {
            let exact = entries
                .iter()
                .filter(|e| e.enabled)
                .find(|e| Self::extract_base_url(&e.base_url).as_deref() == Some(base_url.as_str()));
            if exact.is_some() {
                return exact;
            }
        }

        if let Some(platform) = Self::detect_type(url) {
            let mut best: Option<&PlatformEntry> = None;
            for entry in entries
                .iter()
                .filter(|e| e.enabled && e.platform_type() == platform)
            {
                if best.map_or(true, |b| entry.priority > b.priority) {
                    best = Some(entry);
                }
            }
            if best.is_some() {
                return best;
            }
        }

        let default = default_platform?;
        entries.iter().find(|e| e.enabled && e.name == default)
    }

    /// Whether a URL points somewhere other than the type's public instance
    ///
    /// Unparseable URLs are never reported as self-hosted.
    pub fn is_self_hosted(url: &str, platform: PlatformType) -> bool {
        match Self::extract_base_url(url) {
            Some(base_url) => base_url != platform.default_base_url(),
            None => false,
        }
    }
}

impl ConfigurationDocument {
    /// Resolve the platform entry for a URL
    pub fn resolve(&self, url: &str) -> Result<&PlatformEntry> {
        PlatformDetector::find_best_match(url, &self.platforms, self.default_platform.as_deref())
            .ok_or_else(|| ForgeError::PlatformUnresolved(url.to_string()))
    }
}

/// Parse a URL, accepting scp-like SSH remotes (`git@host:owner/repo`)
fn parse_url(url: &str) -> Option<Url> {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            return Some(parsed);
        }
    }

    let (user_host, path) = url.split_once(':')?;
    if user_host.contains('/')
        || path.starts_with("//")
        || !(user_host.contains('@') || user_host.contains('.'))
    {
        return None;
    }
    let host = user_host.rsplit('@').next()?;
    if host.is_empty() {
        return None;
    }
    Url::parse(&format!("ssh://{}/{}", user_host, path.trim_start_matches('/'))).ok()
}
