//! Model capabilities: text generation and summarization abstractions.
//!
//! Defines the `TextGenerator` and `SummarizationCapability` traits for
//! model-agnostic interactions. Either capability may be absent; callers hold
//! them as `Option`s inside `Capabilities` and check before use.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Options for a single generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// System-level instructions for the model.
    pub system_instructions: String,
    /// When set, the output must be JSON conforming to this schema.
    pub output_schema: Option<serde_json::Value>,
}

impl GenerateOptions {
    pub fn new(system_instructions: impl Into<String>) -> Self {
        Self {
            system_instructions: system_instructions.into(),
            output_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Trait for text-generation providers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`. With an output schema the returned text is JSON.
    async fn generate(&self, prompt: &str, options: &GenerateOptions)
    -> Result<String, CapabilityError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Readiness of the on-device summarization model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Ready,
    Downloadable,
    Downloading,
    Unavailable,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Ready => write!(f, "ready"),
            Availability::Downloadable => write!(f, "downloadable"),
            Availability::Downloading => write!(f, "downloading"),
            Availability::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Summary style requested from the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    KeyPoints,
    Tldr,
    Teaser,
    Headline,
}

/// Output format requested from the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    Markdown,
    PlainText,
}

/// Summary length requested from the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
}

/// Configuration for creating a summarizer handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub summary_type: SummaryType,
    pub format: SummaryFormat,
    pub length: SummaryLength,
    /// Context shared by every call on the handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            summary_type: SummaryType::KeyPoints,
            format: SummaryFormat::Markdown,
            length: SummaryLength::Medium,
            shared_context: None,
        }
    }
}

/// A created summarizer.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, CapabilityError>;
}

/// Factory side of the summarization capability.
#[async_trait]
pub trait SummarizationCapability: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn create(&self, config: &SummarizerConfig)
    -> Result<Box<dyn Summarizer>, CapabilityError>;
}

/// Create a summarizer only when the model is ready.
pub async fn ready_summarizer(
    capability: &dyn SummarizationCapability,
    config: &SummarizerConfig,
) -> Result<Box<dyn Summarizer>, CapabilityError> {
    match capability.availability().await {
        Availability::Ready => capability.create(config).await,
        Availability::Unavailable => Err(CapabilityError::unavailable("summarizer")),
        state => Err(CapabilityError::NotReady {
            capability: "summarizer".to_string(),
            state: state.to_string(),
        }),
    }
}

/// The set of model capabilities available to the pipeline.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub summarizer: Option<Arc<dyn SummarizationCapability>>,
}

impl Capabilities {
    /// No model at all: every strategy falls through to its deterministic path.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn SummarizationCapability>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.generator.is_none() && self.summarizer.is_none()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .field("summarizer", &self.summarizer.is_some())
            .finish()
    }
}

/// A mock generator for testing. Returns queued responses in order, then the
/// fallback response; failures can be queued too.
pub struct MockGenerator {
    responses: Mutex<Vec<Result<String, String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator that always answers with `text`.
    pub fn with_response(text: &str) -> Self {
        let mut generator = Self::new();
        generator.fallback = Some(text.to_string());
        generator
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self::new()
    }

    /// Queue a response for the next call.
    pub fn queue_response(&self, text: &str) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(Ok(text.to_string()));
        }
    }

    /// Queue a failure for the next call.
    pub fn queue_failure(&self, message: &str) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(Err(message.to_string()));
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, CapabilityError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let queued = self
            .responses
            .lock()
            .ok()
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) });
        match queued {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CapabilityError::failed("mock-generator", message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| CapabilityError::failed("mock-generator", "no response queued")),
        }
    }

    fn name(&self) -> &str {
        "mock-generator"
    }
}

/// A mock summarization capability for testing. Records the context passed
/// with every summarize call.
pub struct MockSummarization {
    availability: Availability,
    response: String,
    contexts: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockSummarization {
    /// A ready summarizer that always answers with `response`.
    pub fn ready(response: &str) -> Self {
        Self {
            availability: Availability::Ready,
            response: response.to_string(),
            contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A summarizer stuck in the given availability state.
    pub fn with_availability(availability: Availability) -> Self {
        Self {
            availability,
            ..Self::ready("")
        }
    }

    /// Per-call contexts received so far, in call order.
    pub fn contexts(&self) -> Vec<Option<String>> {
        self.contexts.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

struct MockSummarizerHandle {
    response: String,
    contexts: Arc<Mutex<Vec<Option<String>>>>,
}

#[async_trait]
impl Summarizer for MockSummarizerHandle {
    async fn summarize(&self, _text: &str, context: Option<&str>) -> Result<String, CapabilityError> {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context.map(str::to_string));
        }
        Ok(self.response.clone())
    }
}

#[async_trait]
impl SummarizationCapability for MockSummarization {
    async fn availability(&self) -> Availability {
        self.availability
    }

    async fn create(
        &self,
        _config: &SummarizerConfig,
    ) -> Result<Box<dyn Summarizer>, CapabilityError> {
        Ok(Box::new(MockSummarizerHandle {
            response: self.response.clone(),
            contexts: self.contexts.clone(),
        }))
    }
}
