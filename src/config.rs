use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    #[serde(default = "default_content_root")]
    pub root: PathBuf,
    /// Prefix for record ids and permalinks.
    #[serde(default = "default_namespace")]
    pub base_namespace: String,
    #[serde(default = "default_max_excerpt_length")]
    pub max_excerpt_length: usize,
    #[serde(default = "default_index_file_name")]
    pub index_file_name: String,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_content_root(),
            base_namespace: default_namespace(),
            max_excerpt_length: default_max_excerpt_length(),
            index_file_name: default_index_file_name(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_content_root() -> PathBuf {
    PathBuf::from("content/pages/mcpx")
}
fn default_namespace() -> String {
    "mcpx".to_string()
}
fn default_max_excerpt_length() -> usize {
    160
}
fn default_index_file_name() -> String {
    "index.md".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Application id. Takes precedence over `app_id_env`.
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default = "default_app_id_env")]
    pub app_id_env: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Base URL used for both reads and writes instead of the hosted defaults.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub settings: IndexSettings,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            app_id: None,
            app_id_env: default_app_id_env(),
            api_key_env: default_api_key_env(),
            host: None,
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            settings: IndexSettings::default(),
        }
    }
}

fn default_index_name() -> String {
    "development_mcpx_content".to_string()
}
fn default_app_id_env() -> String {
    "NEXT_PUBLIC_ALGOLIA_APP_ID".to_string()
}
fn default_api_key_env() -> String {
    "ALGOLIA_ADMIN_API_KEY".to_string()
}
fn default_page_size() -> usize {
    1000
}
fn default_batch_size() -> usize {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

/// Ranking and faceting configuration pushed to the index once per run.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    #[serde(default = "default_searchable_attributes")]
    pub searchable_attributes: Vec<String>,
    #[serde(default = "default_facet_attributes")]
    pub attributes_for_faceting: Vec<String>,
    #[serde(default = "default_custom_ranking")]
    pub custom_ranking: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            searchable_attributes: default_searchable_attributes(),
            attributes_for_faceting: default_facet_attributes(),
            custom_ranking: default_custom_ranking(),
        }
    }
}

fn default_searchable_attributes() -> Vec<String> {
    ["title", "content", "excerpt", "categories"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_facet_attributes() -> Vec<String> {
    vec!["categories".to_string()]
}
fn default_custom_ranking() -> Vec<String> {
    vec!["desc(date)".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    2000
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from(".algolia/last-index.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Environment variable holding the webhook bearer secret.
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_secret_env: default_webhook_secret_env(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_webhook_secret_env() -> String {
    "ALGOLIA_WEBHOOK_SECRET".to_string()
}

impl ServerConfig {
    /// The configured webhook secret, if the variable is set and non-empty.
    pub fn webhook_secret(&self) -> Option<String> {
        non_empty_env(&self.webhook_secret_env)
    }
}

/// Credentials for the remote index, resolved from config and environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
}

impl IndexConfig {
    /// Resolves the application id and admin key.
    ///
    /// Fails with [`ConfigError::MissingCredentials`] naming every variable
    /// that still needs to be set.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let app_id = self
            .app_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| non_empty_env(&self.app_id_env));
        let api_key = non_empty_env(&self.api_key_env);

        match (app_id, api_key) {
            (Some(app_id), Some(api_key)) => Ok(Credentials { app_id, api_key }),
            (app_id, api_key) => {
                let mut missing = Vec::new();
                if app_id.is_none() {
                    missing.push(self.app_id_env.as_str());
                }
                if api_key.is_none() {
                    missing.push(self.api_key_env.as_str());
                }
                Err(ConfigError::MissingCredentials(missing.join(" and ")))
            }
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.base_namespace.trim().is_empty() {
            return Err(invalid("content.base_namespace must not be empty"));
        }
        if self.content.max_excerpt_length == 0 {
            return Err(invalid("content.max_excerpt_length must be > 0"));
        }
        if self.index.name.trim().is_empty() {
            return Err(invalid("index.name must not be empty"));
        }
        if !(1..=1000).contains(&self.index.page_size) {
            return Err(invalid("index.page_size must be in [1, 1000]"));
        }
        if self.index.batch_size == 0 {
            return Err(invalid("index.batch_size must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be >= 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.content.base_namespace, "mcpx");
        assert_eq!(config.content.max_excerpt_length, 160);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 2000);
        assert_eq!(
            config.report.path,
            PathBuf::from(".algolia/last-index.json")
        );
        assert_eq!(config.index.settings.custom_ranking, vec!["desc(date)"]);
    }

    #[test]
    fn sections_override_defaults() {
        let config: Config = toml::from_str(
            r#"
[content]
root = "site/articles"
base_namespace = "blog"

[index]
name = "prod_blog"
page_size = 200

[index.settings]
custom_ranking = ["desc(date)", "asc(title)"]

[retry]
max_attempts = 5
delay_ms = 10
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.content.root, PathBuf::from("site/articles"));
        assert_eq!(config.index.page_size, 200);
        assert_eq!(config.index.settings.custom_ranking.len(), 2);
        assert_eq!(
            config.index.settings.searchable_attributes,
            default_searchable_attributes()
        );
        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(10));
    }

    #[test]
    fn zero_attempts_rejected() {
        let config: Config = toml::from_str("[retry]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn oversized_page_rejected() {
        let config: Config = toml::from_str("[index]\npage_size = 5000\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_credentials_name_variables() {
        let index = IndexConfig {
            app_id_env: "CIDX_TEST_UNSET_APP_ID".to_string(),
            api_key_env: "CIDX_TEST_UNSET_API_KEY".to_string(),
            ..IndexConfig::default()
        };
        let err = index.credentials().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CIDX_TEST_UNSET_APP_ID"));
        assert!(msg.contains("CIDX_TEST_UNSET_API_KEY"));
    }

    #[test]
    fn inline_app_id_needs_only_key() {
        let index = IndexConfig {
            app_id: Some("APP123".to_string()),
            api_key_env: "CIDX_TEST_UNSET_API_KEY_2".to_string(),
            ..IndexConfig::default()
        };
        let err = index.credentials().unwrap_err().to_string();
        assert!(err.contains("CIDX_TEST_UNSET_API_KEY_2"));
        assert!(!err.contains("APP_ID"));
    }

    #[test]
    fn example_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../config/cidx.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.content.exclude_globs, vec!["**/drafts/**"]);
        assert_eq!(config.server.bind, "127.0.0.1:8787");
    }
}
