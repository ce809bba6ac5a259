//! Loading, validating and resolving configuration documents from disk

use std::fs;

use tempfile::TempDir;

use forge_auth::core::config::{AuthMethod, ConfigurationDocument, PlatformType};
use forge_auth::core::detection::PlatformDetector;
use forge_auth::core::validation::ConfigValidator;
use forge_auth::ForgeError;

const PLATFORMS: &str = r#"
version = "1.2.0"
default_platform = "Work GitLab"

[global]
default_timeout_secs = 20

[global.logging]
level = "info"
format = "json"

[[platforms]]
type = "github"
name = "GitHub"
base_url = "https://github.com"
default_branch = "main"
priority = 60

[platforms.auth]
method = "pat"
token_env = "GITHUB_TOKEN"
scopes = ["repo", "read:org"]
expires_at = "2030-01-01T00:00:00Z"

[[platforms]]
type = "github"
name = "Enterprise"
base_url = "https://ghe.corp.example"
default_branch = "develop"
priority = 90

[platforms.auth]
method = "app"
app_id = "4242"
private_key_env = "GHE_APP_KEY"
installation_id = 99

[platforms.enterprise.api_endpoints]
graphql = "https://ghe.corp.example/api/graphql"
rest = "https://ghe.corp.example/api/v3"

[[platforms]]
type = "gitlab"
name = "Work GitLab"
base_url = "https://gitlab.corp.example"
default_branch = "release/next"

[platforms.auth]
method = "oauth2"
client_id = "gl-client"
client_secret_env = "GITLAB_SECRET"
redirect_uri = "http://localhost:7777/callback"
scopes = ["read_user", "api"]
timeout_secs = 10

[platforms.namespace]
default_group = "platform"
hierarchy = ["corp", "platform"]

[[platforms]]
type = "forgejo"
name = "Codeberg"
base_url = "https://codeberg.org"
default_branch = "main"
enabled = false

[platforms.auth]
method = "ssh_key"
private_key = "~/.ssh/id_ed25519"
key_type = "ed25519"
"#;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("platforms.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_valid_document() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, PLATFORMS);

    let doc = ConfigurationDocument::load_validated(&path).unwrap();
    assert_eq!(doc.platforms.len(), 4);
    assert_eq!(doc.global.as_ref().unwrap().default_timeout_secs, Some(20));

    let enterprise = doc.platform("Enterprise").unwrap();
    assert_eq!(enterprise.api_base_url(), "https://ghe.corp.example/api/v3");
    match &enterprise.auth.method {
        AuthMethod::App(app) => assert_eq!(app.installation_id, Some(99)),
        other => panic!("unexpected method: {:?}", other),
    }

    let gitlab = doc.platform("Work GitLab").unwrap();
    assert_eq!(gitlab.auth.timeout_secs, Some(10));
    assert_eq!(gitlab.api_base_url(), "https://gitlab.corp.example/api/v4");

    let codeberg = doc.platform("Codeberg").unwrap();
    assert!(!codeberg.enabled);
    assert_eq!(codeberg.priority, 50);
}

#[test]
fn test_resolution_against_loaded_document() {
    let dir = TempDir::new().unwrap();
    let doc = ConfigurationDocument::load_from(&write_config(&dir, PLATFORMS)).unwrap();

    // Exact base URL wins
    assert_eq!(
        doc.resolve("https://ghe.corp.example/team/app.git").unwrap().name,
        "Enterprise"
    );
    assert_eq!(doc.resolve("https://github.com/acme/widgets").unwrap().name, "GitHub");
    // Type match: highest priority GitHub entry
    assert_eq!(
        doc.resolve("https://github.example.org/acme/widgets").unwrap().name,
        "Enterprise"
    );
    // Disabled entries never match; the default takes over
    assert_eq!(doc.resolve("https://codeberg.org/forgejo/forgejo").unwrap().name, "Work GitLab");
    assert_eq!(doc.resolve("https://example.org/some/repo").unwrap().name, "Work GitLab");

    assert_eq!(
        PlatformDetector::detect_type("git@gitlab.corp.example:platform/api.git"),
        Some(PlatformType::Gitlab)
    );
}

#[test]
fn test_unresolvable_without_default() {
    let dir = TempDir::new().unwrap();
    let contents = PLATFORMS.replace("default_platform = \"Work GitLab\"\n", "");
    let doc = ConfigurationDocument::load_from(&write_config(&dir, &contents)).unwrap();

    let err = doc.resolve("https://example.org/some/repo").unwrap_err();
    assert!(matches!(err, ForgeError::PlatformUnresolved(_)));
}

#[test]
fn test_invalid_document_reports_everything() {
    let dir = TempDir::new().unwrap();
    let contents = r#"
version = "one"
default_platform = "Missing"

[[platforms]]
type = "github"
name = "GitHub"
base_url = "https://github.com"
default_branch = "main branch"
priority = 150

[platforms.auth]
method = "oauth2"
client_id = "abc"
redirect_uri = "http://localhost/callback"
scopes = []
client_secret = "s"

[[platforms]]
type = "gitea"
name = "GitHub"
base_url = "https://github.com/"
default_branch = "main"

[platforms.auth]
method = "pat"
"#;
    let path = write_config(&dir, contents);

    let err = ConfigurationDocument::load_validated(&path).unwrap_err();
    let ForgeError::Invalid(violations) = err else {
        panic!("expected validation failure");
    };

    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "version",
            "platforms.1.default_branch",
            "platforms.1.priority",
            "platforms.1.auth.scopes",
            "platforms",
            "platforms",
            "default_platform",
        ]
    );
    assert_eq!(
        violations[3].reason,
        "OAuth2 authentication requires at least one scope"
    );
    assert!(violations[4].reason.contains("'GitHub'"));
}

#[test]
fn test_validation_is_deterministic() {
    let doc = ConfigurationDocument::from_toml_str(PLATFORMS).unwrap();
    assert_eq!(
        ConfigValidator::validate_document(&doc),
        ConfigValidator::validate_document(&doc)
    );
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let doc = ConfigurationDocument::from_toml_str(PLATFORMS).unwrap();

    let path = dir.path().join("nested").join("platforms.toml");
    doc.save_to(&path).unwrap();

    let reloaded = ConfigurationDocument::load_validated(&path).unwrap();
    assert_eq!(reloaded.platforms.len(), doc.platforms.len());
    assert_eq!(reloaded.default_platform.as_deref(), Some("Work GitLab"));
    assert_eq!(reloaded.platform("Codeberg").unwrap().auth.method.tag(), "ssh_key");
}

#[test]
fn test_malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "version = \n[[platforms]");
    assert!(matches!(
        ConfigurationDocument::load_from(&path),
        Err(ForgeError::Toml(_))
    ));
}
