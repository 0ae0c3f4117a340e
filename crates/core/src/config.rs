//! Configuration management for Policy Navigator.
//!
//! Settings are layered, later layers winning:
//! 1. built-in defaults
//! 2. `.navigator/config.yaml` of the workspace (or `--config`)
//! 3. `NAVIGATOR_*`, `RUST_LOG` and `NO_COLOR` environment variables
//! 4. command-line flags ([`CliOverrides`])
//!
//! The workspace itself is resolved first, from the flag or the environment,
//! because it decides which config file is read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Generation providers the workspace knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "extractive"];

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Global settings shared by every CLI command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root, holding `.navigator/` and `data/`
    pub workspace: PathBuf,

    pub config_file: Option<PathBuf>,

    /// Generation provider ("ollama", "extractive")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    pub api_key: Option<String>,

    pub log_level: Option<String>,

    /// Debug logging unless a level is given explicitly
    pub verbose: bool,

    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Provider table from the config file
    pub llm: Option<LlmConfig>,
}

/// `llm` section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Settings of one generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Ollama {
        endpoint: String,
        model: String,
        /// Request timeout in seconds
        timeout: Option<u64>,
    },
    Extractive {
        #[serde(rename = "maxPassageChars")]
        max_passage_chars: Option<usize>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
        }
    }
}

/// Read an environment variable, treating an empty value as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load configuration without command-line overrides.
    ///
    /// # Example
    /// ```no_run
    /// use navigator_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(&CliOverrides::default())
    }

    /// Load configuration, applying every layer.
    ///
    /// Environment variables: `NAVIGATOR_WORKSPACE`, `NAVIGATOR_CONFIG`,
    /// `NAVIGATOR_PROVIDER`, `NAVIGATOR_MODEL`, `NAVIGATOR_API_KEY`,
    /// `RUST_LOG`, `NO_COLOR`.
    pub fn load_with(overrides: &CliOverrides) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = overrides
            .workspace
            .clone()
            .or_else(|| env_var("NAVIGATOR_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }
        if !config.workspace.is_dir() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        config.config_file = overrides
            .config_file
            .clone()
            .or_else(|| env_var("NAVIGATOR_CONFIG").map(PathBuf::from));

        let path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.navigator_dir().join(CONFIG_FILE_NAME));
        if path.exists() {
            config.merge_file(&path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!("Config file not found: {:?}", path)));
        }

        config.apply_env();
        Ok(config.with_overrides(overrides))
    }

    /// Merge a config file over the current values.
    fn merge_file(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Loaded config file {:?}", path);
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: ConfigFile) {
        let logging = file.logging.unwrap_or_default();
        if let Some(level) = logging.level {
            self.log_level = Some(level);
        }
        if let Some(color) = logging.color {
            self.no_color = !color;
        }
        if let Some(json) = logging.json {
            self.log_json = json;
        }

        if let Some(llm) = file.llm {
            self.provider = llm.active_provider.clone();
            if let Some(ProviderConfig::Ollama { model, .. }) = llm.providers.get(&llm.active_provider) {
                self.model = model.clone();
            }
            self.llm = Some(llm);
        }
    }

    fn apply_env(&mut self) {
        if let Some(provider) = env_var("NAVIGATOR_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = env_var("NAVIGATOR_MODEL") {
            self.model = model;
        }
        if let Some(key) = env_var("NAVIGATOR_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(level) = env_var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var_os("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Apply command-line values, which take precedence over everything else.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(workspace) = &overrides.workspace {
            self.workspace = workspace.clone();
        }
        if let Some(config_file) = &overrides.config_file {
            self.config_file = Some(config_file.clone());
        }
        if let Some(provider) = &overrides.provider {
            self.provider = provider.clone();
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = Some(level.clone());
        }

        self.verbose |= overrides.verbose;
        if self.verbose && self.log_level.is_none() {
            self.log_level = Some("debug".to_string());
        }
        self.no_color |= overrides.no_color;
        self.log_json |= overrides.log_json;

        self
    }

    /// Directory holding the workspace's config and index.
    pub fn navigator_dir(&self) -> PathBuf {
        self.workspace.join(".navigator")
    }

    pub fn ensure_navigator_dir(&self) -> AppResult<()> {
        let dir = self.navigator_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::Config(format!("Failed to create {:?}: {}", dir, e))
        })
    }

    /// Settings of a provider, if the config file declares it.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref()?.providers.get(provider)
    }

    /// Endpoint override for the active provider.
    pub fn provider_endpoint(&self) -> Option<&str> {
        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Ollama { endpoint, .. }) => Some(endpoint.as_str()),
            _ => None,
        }
    }

    /// Request timeout for the active provider, in seconds.
    pub fn provider_timeout_secs(&self) -> Option<u64> {
        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Ollama { timeout, .. }) => *timeout,
            _ => None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown generation provider '{}'; expected one of: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Ollama { endpoint, .. })
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) =>
            {
                Err(AppError::Config(format!(
                    "Provider endpoint must be an http(s) URL: {}",
                    endpoint
                )))
            }
            Some(ProviderConfig::Ollama { timeout: Some(0), .. }) => Err(AppError::Config(
                "Provider timeout must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
