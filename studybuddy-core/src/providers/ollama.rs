//! Ollama client: a local model server acting as both text generator and
//! summarizer.
//!
//! Generation goes to `POST {endpoint}/api/generate` with streaming off; an
//! output schema is passed through as the request `format`. Availability is
//! read from `GET {endpoint}/api/tags`.

use crate::capability::{
    Availability, GenerateOptions, SummarizationCapability, Summarizer, SummarizerConfig,
    SummaryFormat, SummaryLength, SummaryType, TextGenerator,
};
use crate::config::ModelConfig;
use crate::error::CapabilityError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "ollama";

/// HTTP client for an Ollama-compatible server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CapabilityError::failed(PROVIDER, format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_body(&self, prompt: &str, options: &GenerateOptions) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if !options.system_instructions.is_empty() {
            body["system"] = Value::String(options.system_instructions.clone());
        }
        if let Some(schema) = &options.output_schema {
            body["format"] = schema.clone();
        }
        body
    }

    /// Model names installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, CapabilityError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CapabilityError::failed(PROVIDER, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::failed(
                PROVIDER,
                format!("HTTP {status} listing models"),
            ));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| CapabilityError::failed(PROVIDER, format!("invalid JSON: {e}")))?;
        Ok(parse_model_names(&body))
    }
}

/// Names from a `/api/tags` response.
fn parse_model_names(body: &Value) -> Vec<String> {
    body["models"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `llama3.2` matches an installed `llama3.2:latest`.
fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model
            || name
                .strip_prefix(model)
                .is_some_and(|rest| rest.starts_with(':'))
    })
}

/// The `response` field of a `/api/generate` reply.
fn parse_generate_response(body: &Value) -> Result<String, CapabilityError> {
    if let Some(error) = body["error"].as_str() {
        return Err(CapabilityError::failed(PROVIDER, error));
    }
    body["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CapabilityError::failed(PROVIDER, "response field missing"))
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, CapabilityError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, structured = options.output_schema.is_some(), "Generating");

        let response = self
            .client
            .post(&url)
            .json(&self.generate_body(prompt, options))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Ollama request failed");
                CapabilityError::failed(PROVIDER, format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::failed(
                PROVIDER,
                format!("HTTP {status}: {text}"),
            ));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| CapabilityError::failed(PROVIDER, format!("invalid JSON: {e}")))?;
        parse_generate_response(&body)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl SummarizationCapability for OllamaClient {
    async fn availability(&self) -> Availability {
        match self.list_models().await {
            Ok(models) if model_installed(&models, &self.model) => Availability::Ready,
            Ok(_) => Availability::Downloadable,
            Err(e) => {
                debug!(error = %e, "Model server not reachable");
                Availability::Unavailable
            }
        }
    }

    async fn create(
        &self,
        config: &SummarizerConfig,
    ) -> Result<Box<dyn Summarizer>, CapabilityError> {
        Ok(Box::new(OllamaSummarizer {
            client: self.clone(),
            config: config.clone(),
        }))
    }
}

/// Summarizer handle that turns its configuration into generation instructions.
struct OllamaSummarizer {
    client: OllamaClient,
    config: SummarizerConfig,
}

fn summary_instructions(config: &SummarizerConfig, context: Option<&str>) -> String {
    let style = match config.summary_type {
        SummaryType::KeyPoints => "a list of key points",
        SummaryType::Tldr => "a short TL;DR",
        SummaryType::Teaser => "an engaging teaser",
        SummaryType::Headline => "a single headline",
    };
    let length = match config.length {
        SummaryLength::Short => "short",
        SummaryLength::Medium => "medium length",
        SummaryLength::Long => "detailed",
    };
    let format = match config.format {
        SummaryFormat::Markdown => "Format the answer as markdown.",
        SummaryFormat::PlainText => "Answer in plain text.",
    };

    let mut instructions = format!("Summarize the text as {style}, {length}. {format}");
    for extra in [config.shared_context.as_deref(), context].into_iter().flatten() {
        instructions.push(' ');
        instructions.push_str(extra);
    }
    instructions
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, CapabilityError> {
        let options = GenerateOptions::new(summary_instructions(&self.config, context));
        self.client.generate(text, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::record_schema;

    fn client() -> OllamaClient {
        OllamaClient::new(&ModelConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:11434/".to_string(),
            ..ModelConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_generate_body() {
        let plain = client().generate_body("hi", &GenerateOptions::default());
        assert_eq!(plain["model"], "llama3.2");
        assert_eq!(plain["stream"], false);
        assert!(plain.get("system").is_none());
        assert!(plain.get("format").is_none());

        let options = GenerateOptions::new("be brief").with_schema(record_schema());
        let structured = client().generate_body("hi", &options);
        assert_eq!(structured["system"], "be brief");
        assert_eq!(structured["format"]["type"], "object");
    }

    #[test]
    fn test_parse_generate_response() {
        assert_eq!(
            parse_generate_response(&json!({"response": "ok", "done": true})).unwrap(),
            "ok"
        );
        assert!(parse_generate_response(&json!({"error": "model not found"})).is_err());
        assert!(parse_generate_response(&json!({})).is_err());
    }

    #[test]
    fn test_model_installed() {
        let body = json!({"models": [{"name": "llama3.2:latest"}, {"name": "phi3:mini"}]});
        let names = parse_model_names(&body);
        assert!(model_installed(&names, "llama3.2"));
        assert!(model_installed(&names, "phi3:mini"));
        assert!(!model_installed(&names, "llama3"));
        assert!(parse_model_names(&json!({})).is_empty());
    }

    #[test]
    fn test_summary_instructions_include_context() {
        let config = SummarizerConfig {
            shared_context: Some("Audience: student; concise.".to_string()),
            ..SummarizerConfig::default()
        };
        let text = summary_instructions(&config, Some("Return JSON."));
        assert!(text.starts_with("Summarize the text as a list of key points, medium length."));
        assert!(text.ends_with("Audience: student; concise. Return JSON."));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let client = OllamaClient::new(&ModelConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..ModelConfig::default()
        })
        .unwrap();
        assert_eq!(client.availability().await, Availability::Unavailable);
    }
}
