//! Model providers implementing the capability traits.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::capability::{Capabilities, SummarizationCapability, TextGenerator};
use crate::config::ModelConfig;
use crate::error::CapabilityError;
use std::sync::Arc;

/// Build the capability set described by `config`. A disabled model yields
/// no capabilities, so every strategy falls through to its deterministic path.
pub fn capabilities_from_config(config: &ModelConfig) -> Result<Capabilities, CapabilityError> {
    if !config.enabled {
        return Ok(Capabilities::none());
    }
    let client = Arc::new(OllamaClient::new(config)?);
    let generator: Arc<dyn TextGenerator> = client.clone();
    let summarizer: Arc<dyn SummarizationCapability> = client;
    Ok(Capabilities::none()
        .with_generator(generator)
        .with_summarizer(summarizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_model_has_no_capabilities() {
        let caps = capabilities_from_config(&ModelConfig::default()).unwrap();
        assert!(caps.is_empty());
    }

    #[test]
    fn test_enabled_model_provides_both() {
        let config = ModelConfig {
            enabled: true,
            ..ModelConfig::default()
        };
        let caps = capabilities_from_config(&config).unwrap();
        assert!(caps.generator.is_some());
        assert!(caps.summarizer.is_some());
    }
}
