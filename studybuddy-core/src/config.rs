//! Configuration system for StudyBuddy.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/studybuddy/config.toml` and/or
//! `.studybuddy/config.toml` in the workspace directory.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyConfig {
    pub store: StoreConfig,
    pub extraction: ExtractionConfig,
    pub normalize: NormalizeConfig,
    pub survey: SurveyConfig,
    pub model: ModelConfig,
}

impl StudyConfig {
    /// Reject settings the pipelines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.store.max_entries == 0 {
            return invalid("store.max_entries must be at least 1");
        }
        if self.extraction.chunk_chars == 0 {
            return invalid("extraction.chunk_chars must be at least 1");
        }
        if self.extraction.chunk_overlap >= self.extraction.chunk_chars {
            return invalid("extraction.chunk_overlap must be smaller than extraction.chunk_chars");
        }
        if self.normalize.max_sentences == 0 {
            return invalid("normalize.max_sentences must be at least 1");
        }
        Ok(())
    }
}

/// Artifact store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of saved artifacts; the oldest beyond this are dropped.
    pub max_entries: usize,
    /// Directory holding the key/value files. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 60,
            data_dir: None,
        }
    }
}

impl StoreConfig {
    /// Resolve the data directory, falling back to the platform data dir and then `.studybuddy`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("dev", "studybuddy", "studybuddy")
            .map(|d| d.data_dir().join("store"))
            .unwrap_or_else(|| PathBuf::from(".studybuddy").join("store"))
    }
}

/// Summarize/structure pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Minimum trimmed input length in characters (inclusive).
    pub min_input_chars: usize,
    /// Inputs longer than this are summarized chunk by chunk.
    pub single_pass_chars: usize,
    /// Chunk window size in characters.
    pub chunk_chars: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Upper bound on bullets requested from the model.
    pub max_bullets: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 40,
            single_pass_chars: 12_000,
            chunk_chars: 8_000,
            chunk_overlap: 600,
            max_bullets: 8,
        }
    }
}

/// Five-field normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Per-field character bound used when normalizing for comparison or survey.
    pub field_limit: usize,
    /// Number of leading sentences the heuristic extractor considers.
    pub max_sentences: usize,
    /// Input text is clamped to this many characters before being sent to a model.
    pub max_prompt_chars: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            field_limit: 500,
            max_sentences: 30,
            max_prompt_chars: 12_000,
        }
    }
}

/// Survey synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Rows kept in each frequency table of the template survey.
    pub top_n: usize,
    /// Raw-text excerpt length per item in the generative prompt.
    pub raw_excerpt_chars: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            top_n: 8,
            raw_excerpt_chars: 1_200,
        }
    }
}

/// Local model server configuration. Disabled by default: every strategy
/// then falls through to its deterministic path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub enabled: bool,
    /// Base URL of an Ollama-compatible server.
    pub endpoint: String,
    /// Model name, as listed by the server.
    pub model: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `STUDYBUDDY_`)
/// 3. Workspace-local config (`.studybuddy/config.toml`)
/// 4. User config (`~/.config/studybuddy/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&StudyConfig>,
) -> Result<StudyConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(StudyConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "studybuddy", "studybuddy") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".studybuddy").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // STUDYBUDDY_STORE__MAX_ENTRIES, STUDYBUDDY_MODEL__ENABLED, ...
    figment = figment.merge(Env::prefixed("STUDYBUDDY_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".studybuddy").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StudyConfig::default();
        assert_eq!(config.store.max_entries, 60);
        assert_eq!(config.extraction.min_input_chars, 40);
        assert_eq!(config.extraction.single_pass_chars, 12_000);
        assert_eq!(config.extraction.chunk_chars, 8_000);
        assert_eq!(config.extraction.chunk_overlap, 600);
        assert_eq!(config.normalize.field_limit, 500);
        assert_eq!(config.normalize.max_sentences, 30);
        assert_eq!(config.survey.top_n, 8);
        assert!(!config.model.enabled);
    }

    #[test]
    fn test_validate() {
        assert!(StudyConfig::default().validate().is_ok());

        let mut config = StudyConfig::default();
        config.extraction.chunk_overlap = config.extraction.chunk_chars;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));

        let mut config = StudyConfig::default();
        config.store.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = StudyConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: StudyConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.store.max_entries, config.store.max_entries);
        assert_eq!(deserialized.model.endpoint, config.model.endpoint);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = StudyConfig::default();
        overrides.store.max_entries = 5;
        overrides.model.model = "phi3".to_string();

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.store.max_entries, 5);
        assert_eq!(config.model.model, "phi3");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".studybuddy");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[store]\nmax_entries = 12\n\n[survey]\ntop_n = 4\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.store.max_entries, 12);
        assert_eq!(config.survey.top_n, 4);
        // Untouched sections keep their defaults.
        assert_eq!(config.extraction.min_input_chars, 40);
    }

    #[test]
    fn test_resolved_data_dir_prefers_explicit() {
        let store = StoreConfig {
            max_entries: 10,
            data_dir: Some(PathBuf::from("/tmp/sb")),
        };
        assert_eq!(store.resolved_data_dir(), PathBuf::from("/tmp/sb"));
    }
}
