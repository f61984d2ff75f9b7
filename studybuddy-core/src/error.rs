//! Error types for the StudyBuddy core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering extraction, model capabilities, output parsing, persistence and
//! configuration.

/// Top-level error type for the StudyBuddy core library.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors caused by the caller's input rather than by a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Not enough text: got {length} characters, need at least {minimum}")]
    InsufficientInput { length: usize, minimum: usize },

    #[error("Select at least {required} saved items (got {found})")]
    NotEnoughArtifacts { found: usize, required: usize },

    #[error("Unknown artifact id: {id}")]
    UnknownArtifact { id: String },
}

/// Errors from the generation, summarization, page-text and PDF capabilities.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("{capability} capability is not available")]
    Unavailable { capability: String },

    #[error("{capability} model is not ready ({state})")]
    NotReady { capability: String, state: String },

    #[error("{capability} call failed: {message}")]
    Failed { capability: String, message: String },
}

impl CapabilityError {
    pub fn unavailable(capability: impl Into<String>) -> Self {
        Self::Unavailable {
            capability: capability.into(),
        }
    }

    pub fn failed(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

/// Errors decoding model output into a typed result.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJsonBlock,

    #[error("Malformed model output: {message}")]
    Malformed { message: String },

    #[error("Model output is missing required field: {field}")]
    MissingField { field: String },

    #[error("Model output was empty")]
    Empty,
}

/// Errors reading or writing the key/value store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },

    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },

    #[error("Stored value for '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// A type alias for results using the top-level `StudyError`.
pub type Result<T> = std::result::Result<T, StudyError>;
