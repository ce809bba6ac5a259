//! Configuration document model and loading
//!
//! A [`ConfigurationDocument`] is parsed once from TOML and then treated as an
//! immutable snapshot. Nested optional blocks stay `None` when absent; nothing
//! here fills in defaults except the loader-level `enabled` and `priority`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::core::secret::SecretSource;
use crate::core::validation::ConfigValidator;
use crate::error::{ForgeError, Result};

/// Hosting platform families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Github,
    Gitlab,
    Gitea,
    Forgejo,
}

impl PlatformType {
    /// Detection precedence, first match wins
    pub fn all() -> &'static [PlatformType] {
        &[
            PlatformType::Github,
            PlatformType::Gitlab,
            PlatformType::Gitea,
            PlatformType::Forgejo,
        ]
    }

    /// Base URL of the public SaaS instance
    pub fn default_base_url(&self) -> &'static str {
        match self {
            PlatformType::Github => "https://github.com",
            PlatformType::Gitlab => "https://gitlab.com",
            PlatformType::Gitea => "https://gitea.com",
            PlatformType::Forgejo => "https://codeberg.org",
        }
    }

    /// Get a human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformType::Github => "GitHub",
            PlatformType::Gitlab => "GitLab",
            PlatformType::Gitea => "Gitea",
            PlatformType::Forgejo => "Forgejo",
        }
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            PlatformType::Github => "github",
            PlatformType::Gitlab => "gitlab",
            PlatformType::Gitea => "gitea",
            PlatformType::Forgejo => "forgejo",
        };
        write!(f, "{}", tag)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

/// A complete configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// Semantic version of the document format
    pub version: String,

    /// Name of the entry used when detection finds nothing better
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_platform: Option<String>,

    /// Platform entries in declaration order
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,

    /// Document-wide defaults for the transport layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalConfig>,
}

impl ConfigurationDocument {
    /// Parse a document from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize the document to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a document from a file without validating it
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load a document and reject it if any violation is found
    pub fn load_validated(path: &Path) -> Result<Self> {
        let doc = Self::load_from(path)?;
        let violations = ConfigValidator::validate_document(&doc);
        if violations.is_empty() {
            Ok(doc)
        } else {
            Err(ForgeError::Invalid(violations))
        }
    }

    /// Save the document to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "forge-auth", "forge-auth")
            .ok_or_else(|| ForgeError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().join("platforms.toml"))
    }

    /// Look up an entry by name
    pub fn platform(&self, name: &str) -> Option<&PlatformEntry> {
        self.platforms.iter().find(|p| p.name == name)
    }

    /// Global logging settings, if any
    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.global.as_ref().and_then(|g| g.logging.as_ref())
    }
}

/// Document-wide defaults consumed by the transport layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Logging output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `forge_auth=debug`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_second: f64,
    pub burst_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Platform entries
// ─────────────────────────────────────────────────────────────────────────────

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i64 {
    50
}

/// One configured hosting platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Unique name of the entry
    pub name: String,

    /// Absolute base URL, unique across the document
    pub base_url: String,

    /// Branch used when a repository does not say otherwise
    pub default_branch: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Detection priority in `0..=100`, higher wins
    #[serde(default = "default_priority")]
    pub priority: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    pub auth: AuthConfig,

    /// The `type` tag plus the type-specific extension block
    #[serde(flatten)]
    pub kind: PlatformKind,
}

impl PlatformEntry {
    /// The entry's platform type
    pub fn platform_type(&self) -> PlatformType {
        self.kind.platform_type()
    }

    /// Root of the REST API for this entry
    pub fn api_base_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.kind {
            PlatformKind::Github(settings) => {
                if let Some(rest) = settings
                    .enterprise
                    .as_ref()
                    .and_then(|e| e.api_endpoints.as_ref())
                    .and_then(|a| a.rest.as_deref())
                {
                    return rest.trim_end_matches('/').to_string();
                }
                if base.eq_ignore_ascii_case(PlatformType::Github.default_base_url()) {
                    "https://api.github.com".to_string()
                } else {
                    format!("{}/api/v3", base)
                }
            }
            PlatformKind::Gitlab(_) => format!("{}/api/v4", base),
            PlatformKind::Gitea(_) | PlatformKind::Forgejo(_) => format!("{}/api/v1", base),
        }
    }

    /// Host part of the base URL, lowercased
    pub fn host(&self) -> Option<String> {
        url::Url::parse(self.base_url.trim())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// Type tag with its optional extension payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlatformKind {
    Github(GithubSettings),
    Gitlab(GitlabSettings),
    Gitea(GiteaSettings),
    Forgejo(ForgejoSettings),
}

impl PlatformKind {
    pub fn platform_type(&self) -> PlatformType {
        match self {
            PlatformKind::Github(_) => PlatformType::Github,
            PlatformKind::Gitlab(_) => PlatformType::Gitlab,
            PlatformKind::Gitea(_) => PlatformType::Gitea,
            PlatformKind::Forgejo(_) => PlatformType::Forgejo,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<GithubEnterprise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelConventions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplatePaths>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubEnterprise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoints: Option<ApiEndpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Enterprise API roots; both are required once the block is present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitlabSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<GitlabNamespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelConventions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplatePaths>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitlabNamespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_group: Option<String>,
    /// Group path from the top-level group down, e.g. `["acme", "platform"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GiteaSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelConventions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplatePaths>,
}

/// Forgejo is Gitea plus federation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgejoSettings {
    #[serde(flatten)]
    pub gitea: GiteaSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation: Option<FederationSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_instances: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelConventions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

/// Repository-relative template paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatePaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication block of a platform entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The `method` tag with its method-specific fields
    #[serde(flatten)]
    pub method: AuthMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    /// Network timeout for authentication calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

/// Method tag; required fields are `Option` so the validator can report them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthMethod {
    Pat(PatAuth),
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Auth),
    App(AppAuth),
    SshKey(SshKeyAuth),
}

impl AuthMethod {
    /// Short tag used in logs and stored credentials
    pub fn tag(&self) -> &'static str {
        match self {
            AuthMethod::Pat(_) => "pat",
            AuthMethod::OAuth2(_) => "oauth2",
            AuthMethod::App(_) => "app",
            AuthMethod::SshKey(_) => "ssh_key",
        }
    }

    /// Whether issued tokens can be renewed without user interaction
    pub fn can_refresh(&self) -> bool {
        matches!(self, AuthMethod::OAuth2(_) | AuthMethod::App(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    /// Scopes the token must grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PatAuth {
    pub fn token_source(&self) -> SecretSource<'_> {
        SecretSource::new(self.token.as_deref(), self.token_env.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuth2Auth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl OAuth2Auth {
    pub fn client_secret_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.client_secret.as_deref(),
            self.client_secret_env.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret_env: Option<String>,
}

impl AppAuth {
    pub fn private_key_source(&self) -> SecretSource<'_> {
        SecretSource::new(self.private_key.as_deref(), self.private_key_env.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshKeyAuth {
    /// Inline key material or a path to the key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<SshKeyType>,
}

impl SshKeyAuth {
    pub fn private_key_source(&self) -> SecretSource<'_> {
        SecretSource::new(self.private_key.as_deref(), self.private_key_env.as_deref())
    }

    pub fn passphrase_source(&self) -> SecretSource<'_> {
        SecretSource::new(self.passphrase.as_deref(), self.passphrase_env.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshKeyType {
    Rsa,
    Ecdsa,
    Ed25519,
}
