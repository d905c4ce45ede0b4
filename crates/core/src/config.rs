//! Configuration management for LexRAG.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - The workspace config file (`.lexrag/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Pipeline tuning lives under the `rag:` key of the same file; it is kept
//! here as a raw YAML section and typed by the knowledge crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".lexrag";

/// Providers the factories know how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["gemini", "ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .lexrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active generation provider ("gemini", "ollama", "mock")
    pub provider: String,

    /// Default generation model identifier
    pub model: String,

    /// API key override for the provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log lines
    pub json_logs: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Raw `rag:` section, typed by `lexrag_knowledge::RagConfig`
    #[serde(skip)]
    pub rag_section: Option<serde_yaml::Value>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider")]
    pub active_embedding_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Generation model name.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Embedding model name, if configured.
    pub fn embedding_model(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini {
                embedding_model, ..
            }
            | ProviderConfig::Ollama {
                embedding_model, ..
            } => embedding_model.as_deref(),
        }
    }

    /// Custom endpoint, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    /// Request timeout in seconds, if configured.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            ProviderConfig::Gemini { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            llm: None,
            rag_section: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `LEXRAG_WORKSPACE`: Override workspace path
    /// - `LEXRAG_CONFIG`: Path to config file
    /// - `LEXRAG_PROVIDER`: Generation provider
    /// - `LEXRAG_MODEL`: Model identifier
    /// - `LEXRAG_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with workspace and config file chosen by
    /// the caller (command-line flags) taking precedence over the environment.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("LEXRAG_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("LEXRAG_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(STATE_DIR).join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("LEXRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("LEXRAG_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("LEXRAG_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        result.rag_section = config_file.rag;

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the .lexrag directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .lexrag directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Path of the SQLite document/vector store.
    pub fn store_path(&self) -> PathBuf {
        self.state_dir().join("store.sqlite")
    }

    /// Get a provider configuration by name.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Name of the provider used for embeddings.
    pub fn embedding_provider(&self) -> String {
        self.llm
            .as_ref()
            .map(|llm| llm.active_embedding_provider.clone())
            .unwrap_or_else(|| self.provider.clone())
    }

    /// Resolve the API key for a provider.
    ///
    /// `LEXRAG_API_KEY` wins; otherwise the provider's `apiKeyEnv` is read.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::Gemini { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        for provider in [self.provider.clone(), self.embedding_provider()] {
            if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
                return Err(AppError::Config(format!(
                    "Unknown provider: {}. Supported: {}",
                    provider,
                    KNOWN_PROVIDERS.join(", ")
                )));
            }

            if provider == "gemini" && self.resolve_api_key(&provider).is_none() {
                return Err(AppError::Config(
                    "Gemini provider requires an API key (LEXRAG_API_KEY or llm.providers.gemini.apiKeyEnv)"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
llm:
  activeProvider: ollama
  activeEmbeddingProvider: mock
  providers:
    gemini:
      apiKeyEnv: LEXRAG_TEST_GEMINI_KEY
      model: gemini-2.0-flash
      embeddingModel: text-embedding-004
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
      embeddingModel: nomic-embed-text
logging:
  level: warn
  color: false
rag:
  embedding:
    dimensions: 768
"#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "gemini");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert!(config.rag_section.is_none());
    }

    #[test]
    fn test_state_paths() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(STATE_DIR));
        assert!(config.store_path().ends_with("store.sqlite"));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let merged = AppConfig::default().merge_yaml_str(SAMPLE).unwrap();

        assert_eq!(merged.provider, "ollama");
        assert_eq!(merged.model, "llama3.2");
        assert_eq!(merged.embedding_provider(), "mock");
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        assert!(merged.rag_section.is_some());

        let gemini = merged.get_provider_config("gemini").unwrap();
        assert_eq!(gemini.embedding_model(), Some("text-embedding-004"));
        assert!(matches!(gemini, ProviderConfig::Gemini { .. }));
    }

    #[test]
    fn test_merge_yaml_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.provider, "ollama");
    }

    #[test]
    fn test_load_from_explicit_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config =
            AppConfig::load_from(Some(temp.path().to_path_buf()), Some(path.clone())).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.embedding_provider(), "mock");
        assert!(config.rag_section.is_some());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mock_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_gemini_with_explicit_key() {
        let mut config = AppConfig::default();
        config.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }
}
