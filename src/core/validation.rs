//! Configuration validation
//!
//! Pure checks over a [`ConfigurationDocument`]. Every problem is collected in
//! one pass; nothing here fails fast or touches state outside its argument.
//! An empty result means the document is safe to use.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::core::config::{
    AuthConfig, AuthMethod, ConfigurationDocument, GithubSettings, GitlabSettings, PlatformEntry,
    PlatformKind, TemplatePaths,
};

/// Semantic version, with optional pre-release and build metadata
static SEMVER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("Invalid regex pattern for semantic versions")
});

static BRANCH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9/_-]+$").expect("Invalid regex pattern for branch names")
});

/// One configuration problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `platforms.2.auth.scopes`
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn prefixed(mut self, prefix: &str) -> Self {
        self.field = format!("{}.{}", prefix, self.field);
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Validator for configuration documents
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a whole document
    ///
    /// Order of the returned list: version, emptiness, per-entry problems in
    /// document order, duplicate names, duplicate base URLs, default platform.
    pub fn validate_document(doc: &ConfigurationDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !SEMVER_PATTERN.is_match(doc.version.trim()) {
            errors.push(ValidationError::new(
                "version",
                format!("'{}' is not a semantic version (expected MAJOR.MINOR.PATCH)", doc.version),
            ));
        }

        if doc.platforms.is_empty() {
            errors.push(ValidationError::new(
                "platforms",
                "At least one platform must be configured",
            ));
        }

        for (index, entry) in doc.platforms.iter().enumerate() {
            let prefix = format!("platforms.{}", index + 1);
            errors.extend(
                Self::validate_platform(entry)
                    .into_iter()
                    .map(|e| e.prefixed(&prefix)),
            );
        }

        let names = duplicates(doc.platforms.iter().map(|p| p.name.clone()));
        for (name, positions) in names {
            errors.push(ValidationError::new(
                "platforms",
                format!(
                    "Duplicate platform name '{}' (entries {})",
                    name,
                    join_positions(&positions)
                ),
            ));
        }

        let urls = duplicates(doc.platforms.iter().map(|p| normalize_base_url(&p.base_url)));
        for (url, positions) in urls {
            errors.push(ValidationError::new(
                "platforms",
                format!(
                    "Duplicate base URL '{}' (entries {})",
                    url,
                    join_positions(&positions)
                ),
            ));
        }

        // Runs last so entry-level problems are reported even when the
        // default reference is broken.
        if let Some(default) = &doc.default_platform {
            if !doc.platforms.iter().any(|p| &p.name == default) {
                errors.push(ValidationError::new(
                    "default_platform",
                    format!("Default platform '{}' does not name a configured platform", default),
                ));
            }
        }

        errors
    }

    /// Validate a single platform entry; fields are relative to the entry
    pub fn validate_platform(entry: &PlatformEntry) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if entry.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "Platform name must not be blank"));
        }

        if let Err(reason) = check_absolute_url(&entry.base_url) {
            errors.push(ValidationError::new("base_url", reason));
        }

        if !BRANCH_PATTERN.is_match(&entry.default_branch) {
            errors.push(ValidationError::new(
                "default_branch",
                format!(
                    "'{}' may only contain letters, digits, '/', '_' and '-'",
                    entry.default_branch
                ),
            ));
        }

        if !(0..=100).contains(&entry.priority) {
            errors.push(ValidationError::new(
                "priority",
                format!("Priority {} is outside the range 0..=100", entry.priority),
            ));
        }

        if let Some(proxy) = &entry.proxy {
            if let Err(reason) = check_absolute_url(&proxy.url) {
                errors.push(ValidationError::new("proxy.url", reason));
            }
        }

        errors.extend(
            Self::validate_authentication(&entry.auth)
                .into_iter()
                .map(|e| e.prefixed("auth")),
        );

        match &entry.kind {
            PlatformKind::Github(settings) => errors.extend(validate_github(settings)),
            PlatformKind::Gitlab(settings) => errors.extend(validate_gitlab(settings)),
            PlatformKind::Gitea(settings) => {
                errors.extend(validate_templates(settings.templates.as_ref()))
            }
            PlatformKind::Forgejo(settings) => {
                errors.extend(validate_templates(settings.gitea.templates.as_ref()))
            }
        }

        errors
    }

    /// Cross-field checks for an auth block; fields are relative to the block
    pub fn validate_authentication(auth: &AuthConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match &auth.method {
            AuthMethod::Pat(pat) => {
                if let Some(scopes) = &pat.scopes {
                    if scopes.iter().any(|s| s.trim().is_empty()) {
                        errors.push(ValidationError::new("scopes", "Scopes must not be blank"));
                    }
                }
            }
            AuthMethod::OAuth2(oauth) => {
                if is_blank(oauth.client_id.as_deref()) {
                    errors.push(ValidationError::new(
                        "client_id",
                        "OAuth2 authentication requires a client ID",
                    ));
                }
                match oauth.redirect_uri.as_deref() {
                    None => errors.push(ValidationError::new(
                        "redirect_uri",
                        "OAuth2 authentication requires a redirect URI",
                    )),
                    Some(uri) => {
                        if let Err(e) = Url::parse(uri.trim()) {
                            errors.push(ValidationError::new(
                                "redirect_uri",
                                format!("'{}' is not a valid URI ({})", uri, e),
                            ));
                        }
                    }
                }
                if oauth.scopes.as_ref().map_or(true, |s| s.is_empty()) {
                    errors.push(ValidationError::new(
                        "scopes",
                        "OAuth2 authentication requires at least one scope",
                    ));
                }
                if !oauth.client_secret_source().is_declared() {
                    errors.push(ValidationError::new(
                        "client_secret",
                        "OAuth2 authentication requires client_secret or client_secret_env",
                    ));
                }
                for (field, value) in [
                    ("authorize_url", oauth.authorize_url.as_deref()),
                    ("token_url", oauth.token_url.as_deref()),
                ] {
                    if let Some(endpoint) = value {
                        if let Err(reason) = check_absolute_url(endpoint) {
                            errors.push(ValidationError::new(field, reason));
                        }
                    }
                }
            }
            AuthMethod::App(app) => {
                if is_blank(app.app_id.as_deref()) {
                    errors.push(ValidationError::new(
                        "app_id",
                        "App authentication requires an app ID",
                    ));
                }
                if !app.private_key_source().is_declared() {
                    errors.push(ValidationError::new(
                        "private_key",
                        "App authentication requires private_key or private_key_env",
                    ));
                }
            }
            AuthMethod::SshKey(ssh) => {
                if !ssh.private_key_source().is_declared() {
                    errors.push(ValidationError::new(
                        "private_key",
                        "SSH key authentication requires private_key or private_key_env",
                    ));
                }
            }
        }

        if auth.timeout_secs == Some(0) {
            errors.push(ValidationError::new("timeout_secs", "Timeout must be greater than zero"));
        }

        if let Some(limit) = &auth.rate_limit {
            if limit.requests_per_second.is_nan() || limit.requests_per_second <= 0.0 {
                errors.push(ValidationError::new(
                    "rate_limit.requests_per_second",
                    "Rate limit must be greater than zero",
                ));
            }
            if limit.burst_size == 0 {
                errors.push(ValidationError::new(
                    "rate_limit.burst_size",
                    "Burst size must be greater than zero",
                ));
            }
        }

        errors
    }
}

fn validate_github(settings: &GithubSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(endpoints) = settings
        .enterprise
        .as_ref()
        .and_then(|e| e.api_endpoints.as_ref())
    {
        for (field, value) in [
            ("graphql", endpoints.graphql.as_deref()),
            ("rest", endpoints.rest.as_deref()),
        ] {
            let path = format!("enterprise.api_endpoints.{}", field);
            match value {
                None => errors.push(ValidationError::new(
                    path,
                    "GitHub Enterprise API endpoints require both graphql and rest",
                )),
                Some(url) => {
                    if let Err(reason) = check_absolute_url(url) {
                        errors.push(ValidationError::new(path, reason));
                    }
                }
            }
        }
    }

    errors.extend(validate_templates(settings.templates.as_ref()));
    errors
}

fn validate_gitlab(settings: &GitlabSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(namespace) = &settings.namespace {
        let has_group = !is_blank(namespace.default_group.as_deref());
        let hierarchy_empty = namespace.hierarchy.as_ref().map_or(true, |h| h.is_empty());
        if has_group && hierarchy_empty {
            errors.push(ValidationError::new(
                "namespace.hierarchy",
                "A GitLab default group requires a namespace hierarchy",
            ));
        }
    }

    errors.extend(validate_templates(settings.templates.as_ref()));
    errors
}

fn validate_templates(templates: Option<&TemplatePaths>) -> Vec<ValidationError> {
    let Some(templates) = templates else {
        return Vec::new();
    };

    [
        ("templates.pull_request", templates.pull_request.as_deref()),
        ("templates.issue", templates.issue.as_deref()),
    ]
    .into_iter()
    .filter_map(|(field, value)| match value {
        Some(path) if path.trim().is_empty() => {
            Some(ValidationError::new(field, "Template path must not be blank"))
        }
        _ => None,
    })
    .collect()
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Check that a string is an absolute http(s) URL with a host
fn check_absolute_url(value: &str) -> Result<(), String> {
    let parsed = Url::parse(value.trim()).map_err(|e| format!("'{}' is not a valid URL ({})", value, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("'{}' must use http or https", value));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("'{}' has no host", value));
    }
    Ok(())
}

/// Normalized form used for base URL comparisons
fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Values seen more than once, in first-occurrence order, with 1-based positions
fn duplicates(values: impl Iterator<Item = String>) -> Vec<(String, Vec<usize>)> {
    let mut order: Vec<String> = Vec::new();
    let mut positions: HashMap<String, Vec<usize>> = HashMap::new();

    for (index, value) in values.enumerate() {
        let seen = positions.entry(value.clone()).or_default();
        if seen.is_empty() {
            order.push(value);
        }
        seen.push(index + 1);
    }

    order
        .into_iter()
        .filter_map(|value| {
            let found = positions.remove(&value)?;
            (found.len() > 1).then_some((value, found))
        })
        .collect()
}

fn join_positions(positions: &[usize]) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        ApiEndpoints, GithubEnterprise, GitlabNamespace, OAuth2Auth, PatAuth, SshKeyAuth,
        TemplatePaths,
    };

    fn pat_auth() -> AuthConfig {
        AuthConfig {
            method: AuthMethod::Pat(PatAuth {
                token_env: Some("GITHUB_TOKEN".into()),
                ..Default::default()
            }),
            headers: None,
            timeout_secs: None,
            rate_limit: None,
        }
    }

    fn entry(name: &str, base_url: &str) -> PlatformEntry {
        PlatformEntry {
            name: name.to_string(),
            base_url: base_url.to_string(),
            default_branch: "main".to_string(),
            enabled: true,
            priority: 50,
            headers: None,
            proxy: None,
            auth: pat_auth(),
            kind: PlatformKind::Github(GithubSettings::default()),
        }
    }

    fn document(platforms: Vec<PlatformEntry>) -> ConfigurationDocument {
        ConfigurationDocument {
            version: "1.0.0".to_string(),
            default_platform: None,
            platforms,
            global: None,
        }
    }

    fn oauth(scopes: Option<Vec<String>>) -> AuthConfig {
        AuthConfig {
            method: AuthMethod::OAuth2(OAuth2Auth {
                client_id: Some("client".into()),
                client_secret_env: Some("SECRET".into()),
                redirect_uri: Some("http://localhost:8080/callback".into()),
                scopes,
                ..Default::default()
            }),
            headers: None,
            timeout_secs: None,
            rate_limit: None,
        }
    }

    #[test]
    fn test_valid_document_has_no_errors() {
        let doc = document(vec![
            entry("GitHub", "https://github.com"),
            entry("Enterprise", "https://enterprise.github.com"),
        ]);
        assert!(ConfigValidator::validate_document(&doc).is_empty());
    }

    #[test]
    fn test_duplicate_name_reported_once() {
        let doc = document(vec![
            entry("GitHub", "https://github.com"),
            entry("GitHub", "https://ghe.example.com"),
        ]);
        let errors = ConfigValidator::validate_document(&doc);
        let duplicates: Vec<_> = errors
            .iter()
            .filter(|e| e.reason.starts_with("Duplicate platform name"))
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert!(duplicates[0].reason.contains("'GitHub'"));
        assert!(duplicates[0].reason.contains("entries 1, 2"));
    }

    #[test]
    fn test_duplicate_base_url_ignores_trailing_slash() {
        let doc = document(vec![
            entry("A", "https://github.com"),
            entry("B", "https://github.com/"),
            entry("C", "https://GitHub.com"),
        ]);
        let errors = ConfigValidator::validate_document(&doc);
        let duplicates: Vec<_> = errors
            .iter()
            .filter(|e| e.reason.starts_with("Duplicate base URL"))
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert!(duplicates[0].reason.contains("entries 1, 2, 3"));
    }

    #[test]
    fn test_missing_default_platform_reported_last() {
        let mut bad = entry("GitHub", "not a url");
        bad.priority = 101;
        let mut doc = document(vec![bad]);
        doc.default_platform = Some("Nope".into());

        let errors = ConfigValidator::validate_document(&doc);
        assert_eq!(errors.last().unwrap().field, "default_platform");
        assert!(errors.iter().any(|e| e.field == "platforms.1.base_url"));
        assert!(errors.iter().any(|e| e.field == "platforms.1.priority"));
    }

    #[test]
    fn test_version_and_empty_platforms() {
        let mut doc = document(Vec::new());
        doc.version = "v1".into();
        let errors = ConfigValidator::validate_document(&doc);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "version");
        assert_eq!(errors[1].field, "platforms");
    }

    #[test]
    fn test_semver_accepts_prerelease() {
        let mut doc = document(vec![entry("GitHub", "https://github.com")]);
        doc.version = "2.1.0-beta.1+build.5".into();
        assert!(ConfigValidator::validate_document(&doc).is_empty());
    }

    #[test]
    fn test_branch_pattern() {
        let mut e = entry("GitHub", "https://github.com");
        e.default_branch = "release/v1_2-x".into();
        assert!(ConfigValidator::validate_platform(&e).is_empty());

        e.default_branch = "main branch".into();
        let errors = ConfigValidator::validate_platform(&e);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "default_branch");
    }

    #[test]
    fn test_oauth_empty_scopes_message() {
        let errors = ConfigValidator::validate_authentication(&oauth(Some(Vec::new())));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].reason,
            "OAuth2 authentication requires at least one scope"
        );
    }

    #[test]
    fn test_oauth_missing_fields() {
        let auth = AuthConfig {
            method: AuthMethod::OAuth2(OAuth2Auth::default()),
            headers: None,
            timeout_secs: None,
            rate_limit: None,
        };
        let fields: Vec<_> = ConfigValidator::validate_authentication(&auth)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec!["client_id", "redirect_uri", "scopes", "client_secret"]);
    }

    #[test]
    fn test_custom_scheme_redirect_and_absolute_template_are_valid() {
        let mut native = entry("Native", "https://github.com");
        native.auth = oauth(Some(vec!["repo".into()]));
        if let AuthMethod::OAuth2(config) = &mut native.auth.method {
            config.redirect_uri = Some("com.example.app:/oauth2redirect".into());
        }
        native.kind = PlatformKind::Github(GithubSettings {
            templates: Some(TemplatePaths {
                pull_request: Some("/.github/pull_request_template.md".into()),
                issue: None,
            }),
            ..Default::default()
        });

        let mut doc = document(vec![native, entry("Enterprise", "https://ghe.example.com")]);
        doc.default_platform = Some("Enterprise".into());
        assert!(ConfigValidator::validate_document(&doc).is_empty());
    }

    #[test]
    fn test_unparseable_redirect_uri() {
        let mut auth = oauth(Some(vec!["repo".into()]));
        if let AuthMethod::OAuth2(config) = &mut auth.method {
            config.redirect_uri = Some("not a uri".into());
        }
        let errors = ConfigValidator::validate_authentication(&auth);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "redirect_uri");
    }

    #[test]
    fn test_ssh_requires_key() {
        let auth = AuthConfig {
            method: AuthMethod::SshKey(SshKeyAuth::default()),
            headers: None,
            timeout_secs: None,
            rate_limit: None,
        };
        let errors = ConfigValidator::validate_authentication(&auth);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "private_key");
    }

    #[test]
    fn test_pat_without_secret_is_valid() {
        let auth = AuthConfig {
            method: AuthMethod::Pat(PatAuth::default()),
            headers: None,
            timeout_secs: None,
            rate_limit: None,
        };
        assert!(ConfigValidator::validate_authentication(&auth).is_empty());
    }

    #[test]
    fn test_github_enterprise_requires_both_endpoints() {
        let mut e = entry("GHE", "https://ghe.example.com");
        e.kind = PlatformKind::Github(GithubSettings {
            enterprise: Some(GithubEnterprise {
                api_endpoints: Some(ApiEndpoints {
                    graphql: Some("https://ghe.example.com/api/graphql".into()),
                    rest: None,
                }),
                version: None,
            }),
            ..Default::default()
        });
        let errors = ConfigValidator::validate_platform(&e);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "enterprise.api_endpoints.rest");

        // An enterprise block without endpoints is fine
        e.kind = PlatformKind::Github(GithubSettings {
            enterprise: Some(GithubEnterprise::default()),
            ..Default::default()
        });
        assert!(ConfigValidator::validate_platform(&e).is_empty());
    }

    #[test]
    fn test_gitlab_group_requires_hierarchy() {
        let mut e = entry("GitLab", "https://gitlab.com");
        e.kind = PlatformKind::Gitlab(GitlabSettings {
            namespace: Some(GitlabNamespace {
                default_group: Some("acme".into()),
                hierarchy: None,
            }),
            ..Default::default()
        });
        let errors = ConfigValidator::validate_platform(&e);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "namespace.hierarchy");
    }

    #[test]
    fn test_validation_is_deterministic() {
        let mut doc = document(vec![
            entry("GitHub", "https://github.com"),
            entry("GitHub", "https://github.com"),
            entry("", "bad"),
        ]);
        doc.default_platform = Some("missing".into());
        let first = ConfigValidator::validate_document(&doc);
        let second = ConfigValidator::validate_document(&doc);
        assert_eq!(first, second);
    }
}
