//! Pipeline configuration.
//!
//! Loaded from `.navigator/knowledge.yaml`; every field has a default so a
//! missing file or a partial file is valid.

use crate::chunk::ChunkConfig;
use crate::embeddings::EmbeddingConfig;
use crate::retry::{RetryPolicy, MAX_RETRIES};
use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "knowledge.yaml";

/// Live-lookup registry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_registry_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_registry_retries")]
    pub max_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_registry_endpoint() -> String {
    "https://www.federalregister.gov/api/v1".to_string()
}

fn default_registry_timeout() -> u64 {
    20
}

fn default_registry_retries() -> u32 {
    1
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_registry_endpoint(),
            timeout_secs: default_registry_timeout(),
            max_retries: default_registry_retries(),
        }
    }
}

impl RegistryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries.saturating_add(1),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkConfig,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a chunk to count as relevant
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    /// Top score below which the answer is phrased cautiously
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Context budget for the generation prompt, in characters
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default)]
    pub generation_retries: u32,

    #[serde(default)]
    pub registry: RegistryConfig,

    /// Canonical document collection, indexed at startup and on rebuild
    #[serde(default = "default_initial_dir")]
    pub initial_dir: PathBuf,

    /// Where ingested files are copied
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

fn default_top_k() -> usize {
    5
}

fn default_similarity_floor() -> f32 {
    0.20
}

fn default_confidence_threshold() -> f32 {
    0.30
}

fn default_max_context_chars() -> usize {
    6000
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_initial_dir() -> PathBuf {
    PathBuf::from("data/initial_files")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploaded_files")
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".navigator/index.sqlite")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            chunking: ChunkConfig::default(),
            top_k: default_top_k(),
            similarity_floor: default_similarity_floor(),
            confidence_threshold: default_confidence_threshold(),
            max_context_chars: default_max_context_chars(),
            generation_timeout_secs: default_generation_timeout(),
            generation_retries: 0,
            registry: RegistryConfig::default(),
            initial_dir: default_initial_dir(),
            uploads_dir: default_uploads_dir(),
            index_path: default_index_path(),
        }
    }
}

impl KnowledgeConfig {
    pub fn generation_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.generation_retries.saturating_add(1),
            Duration::from_secs(self.generation_timeout_secs),
        )
    }

    /// Resolve a configured path against the workspace.
    pub fn resolve(workspace: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace.join(path)
        }
    }

    pub fn initial_dir_in(&self, workspace: &Path) -> PathBuf {
        Self::resolve(workspace, &self.initial_dir)
    }

    pub fn uploads_dir_in(&self, workspace: &Path) -> PathBuf {
        Self::resolve(workspace, &self.uploads_dir)
    }

    pub fn index_path_in(&self, workspace: &Path) -> PathBuf {
        Self::resolve(workspace, &self.index_path)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.embedding.validate()?;
        self.chunking.validate()?;

        if self.top_k == 0 {
            return Err(AppError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.similarity_floor) {
            return Err(AppError::Config(format!(
                "similarity_floor must be between -1 and 1, got {}",
                self.similarity_floor
            )));
        }
        if !(-1.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "confidence_threshold must be between -1 and 1, got {}",
                self.confidence_threshold
            )));
        }
        if self.max_context_chars == 0 {
            return Err(AppError::Config(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 || self.registry.timeout_secs == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.registry.max_retries > MAX_RETRIES {
            return Err(AppError::Config(format!(
                "registry.max_retries must be at most {}, got {}",
                MAX_RETRIES, self.registry.max_retries
            )));
        }

        Ok(())
    }
}

/// Path of the pipeline config file in a workspace.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".navigator").join(CONFIG_FILE)
}

/// Load the pipeline configuration, falling back to defaults.
pub fn load_config(workspace: &Path) -> AppResult<KnowledgeConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No {} found, using default pipeline config", CONFIG_FILE);
        return Ok(KnowledgeConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    config.validate()?;
    tracing::debug!("Loaded pipeline config from {:?}", config_path);
    Ok(config)
}

/// Save the pipeline configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved pipeline config to {:?}", config_path);
    Ok(())
}
