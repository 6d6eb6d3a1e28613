//! # CLI Configuration
//!
//! Endpoint URLs and pipeline tunables for the `kbc` binary. Values are layered:
//! built-in defaults, then an optional YAML file (`kbc.yml` in the current
//! directory, or the path given with `--config`), then `KBC_`-prefixed
//! environment variables. Nested keys use a double underscore, e.g.
//! `KBC_OPENAI__BASE_URL` or `KBC_TRACKER__MAX_ATTEMPTS`.
//!
//! The YAML file may reference environment variables as `${VAR}`; they are
//! substituted before parsing.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use kbc::constants::{
    DEFAULT_BATCH_ENDPOINT, DEFAULT_COMPLETION_WINDOW, DEFAULT_JOB_DESCRIPTION,
    DEFAULT_MAX_SUBMIT_ATTEMPTS, DEFAULT_RETRY_BACKOFF_SECS, DEFAULT_SEARCH_DELAY_SECS,
    DEFAULT_SNIPPET_TOP_K,
};
use kbc::providers::reference::wikidata::{WIKIDATA_API_URL, WIKIDATA_ENTITY_DATA_URL};
use kbc::providers::search::brave::BRAVE_SEARCH_URL;
use kbc::TrackerSettings;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// The config file picked up from the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "kbc.yml";

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BRAVE_TOKEN_VAR: &str = "BRAVE_SUBSCRIPTION_TOKEN";

#[derive(Debug)]
pub enum ConfigError {
    /// An error from the underlying `config` crate, or an unreadable file.
    General(String),
    /// An explicitly requested config file does not exist.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub brave: BraveConfig,
    pub wikidata: WikidataConfig,
    pub tracker: TrackerConfig,
    pub eval: EvalConfig,
}

/// Batch and chat-completions endpoint. Also used for the judge model.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BraveConfig {
    pub search_url: String,
    pub subscription_token: Option<String>,
    pub top_k: usize,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            search_url: BRAVE_SEARCH_URL.to_string(),
            subscription_token: None,
            top_k: DEFAULT_SNIPPET_TOP_K,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WikidataConfig {
    pub api_url: String,
    pub entity_data_url: String,
    pub language: String,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            api_url: WIKIDATA_API_URL.to_string(),
            entity_data_url: WIKIDATA_ENTITY_DATA_URL.to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    pub job_description: String,
    pub endpoint: String,
    pub completion_window: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_SUBMIT_ATTEMPTS,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            job_description: DEFAULT_JOB_DESCRIPTION.to_string(),
            endpoint: DEFAULT_BATCH_ENDPOINT.to_string(),
            completion_window: DEFAULT_COMPLETION_WINDOW.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EvalConfig {
    pub search_delay_secs: u64,
    /// Overrides `<work_dir>/wikidata_gold.json`.
    pub gold_path: Option<PathBuf>,
    /// Overrides `<work_dir>/snippets`.
    pub snippet_dir: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            search_delay_secs: DEFAULT_SEARCH_DELAY_SECS,
            gold_path: None,
            snippet_dir: None,
        }
    }
}

impl AppConfig {
    /// The key from the config file, falling back to `OPENAI_API_KEY`.
    pub fn openai_api_key(&self) -> Option<String> {
        non_empty(self.openai.api_key.clone()).or_else(|| non_empty(env::var(OPENAI_API_KEY_VAR).ok()))
    }

    /// The token from the config file, falling back to `BRAVE_SUBSCRIPTION_TOKEN`.
    pub fn brave_token(&self) -> Option<String> {
        non_empty(self.brave.subscription_token.clone())
            .or_else(|| non_empty(env::var(BRAVE_TOKEN_VAR).ok()))
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            max_attempts: self.tracker.max_attempts,
            retry_backoff: Duration::from_secs(self.tracker.retry_backoff_secs),
            job_description: self.tracker.job_description.clone(),
            endpoint: self.tracker.endpoint.clone(),
            completion_window: self.tracker.completion_window.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Reads a file and replaces `${VAR}` with the variable's value (empty if unset).
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").unwrap();
    let expanded = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });
    Ok(Some(expanded.into_owned()))
}

/// Loads the layered configuration.
///
/// An explicit `config_path_override` must exist; the default `kbc.yml` is
/// optional.
pub fn load_config(config_path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let (path, explicit) = match config_path_override {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match read_and_substitute(&path)? {
        Some(content) => {
            info!("Loading configuration from '{}'.", path.display());
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if explicit => {
            return Err(ConfigError::NotFound(format!(
                "Config file '{}' not found",
                path.display()
            )));
        }
        None => {}
    }

    let config = builder
        .add_source(
            Environment::with_prefix("KBC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = load_config(Some(Path::new("/definitely/not/here.yml")));
        assert!(matches!(config, Err(ConfigError::NotFound(_))));

        let config = AppConfig::default();
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.tracker.max_attempts, 5);
        assert_eq!(config.brave.top_k, 5);
    }

    #[test]
    fn yaml_file_is_substituted_and_layered_on_defaults() {
        // --- 1. Arrange ---
        env::set_var("KBC_TEST_JUDGE_KEY", "sk-from-env");
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "openai:\n  base_url: http://localhost:9999/v1\n  api_key: ${{KBC_TEST_JUDGE_KEY}}\ntracker:\n  max_attempts: 2\n"
        )
        .unwrap();

        // --- 2. Act ---
        let config = load_config(Some(file.path())).unwrap();

        // --- 3. Assert ---
        assert_eq!(config.openai.base_url, "http://localhost:9999/v1");
        assert_eq!(config.openai_api_key().as_deref(), Some("sk-from-env"));
        assert_eq!(config.tracker.max_attempts, 2);
        assert_eq!(config.tracker.completion_window, "24h");
        assert_eq!(config.brave.top_k, 5);
        assert_eq!(
            config.tracker_settings().retry_backoff,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn prefixed_environment_overrides_nested_keys() {
        env::set_var("KBC_WIKIDATA__LANGUAGE", "de");
        let file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.wikidata.language, "de");
        env::remove_var("KBC_WIKIDATA__LANGUAGE");
    }
}
