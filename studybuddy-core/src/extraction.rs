//! Extraction pipeline: input text into a summary or a five-field record.
//!
//! Long inputs are summarized chunk by chunk and then merged in a second
//! pass. The pipeline never persists anything; callers save the result.

use crate::capability::{
    Capabilities, GenerateOptions, Summarizer, SummarizerConfig, SummaryFormat, SummaryLength,
    SummaryType, ready_summarizer,
};
use crate::config::ExtractionConfig;
use crate::error::{CapabilityError, ExtractionError, ParseError, Result, StudyError};
use crate::normalizer::{ContentNormalizer, SUMMARY_CONTEXT, Strategy};
use crate::text::char_len;
use crate::types::StructuredRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    Summarize,
    Structure,
}

/// Result of an extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Summary(String),
    Structured {
        record: StructuredRecord,
        strategy: Strategy,
    },
}

/// Turns input text into summaries or records.
pub struct ExtractionPipeline {
    capabilities: Capabilities,
    normalizer: Arc<ContentNormalizer>,
    config: ExtractionConfig,
}

impl ExtractionPipeline {
    pub fn new(
        capabilities: Capabilities,
        normalizer: Arc<ContentNormalizer>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            capabilities,
            normalizer,
            config,
        }
    }

    /// Extract from `text` in the given mode.
    pub async fn extract(&self, text: &str, mode: ExtractMode) -> Result<Extraction> {
        match mode {
            ExtractMode::Summarize => self.summarize(text).await.map(Extraction::Summary),
            ExtractMode::Structure => {
                let (record, strategy) = self.structure(text).await?;
                Ok(Extraction::Structured { record, strategy })
            }
        }
    }

    /// Summarize `text`. The trimmed input must be at least
    /// `min_input_chars` characters long.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let input = self.checked_input(text)?;
        let summary = match (&self.capabilities.generator, &self.capabilities.summarizer) {
            (Some(_), None) => self.summarize_with_generator(input).await?,
            (Some(_), Some(_)) => match self.summarize_with_generator(input).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(error = %e, "Generator summary failed, using summarizer");
                    self.summarize_with_summarizer(input).await?
                }
            },
            (None, Some(_)) => self.summarize_with_summarizer(input).await?,
            (None, None) => return Err(CapabilityError::unavailable("summarization").into()),
        };

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(ParseError::Empty.into());
        }
        Ok(summary)
    }

    /// Structure `text` into the five fields, unbounded. Same length
    /// precondition as `summarize`.
    pub async fn structure(&self, text: &str) -> Result<(StructuredRecord, Strategy)> {
        let input = self.checked_input(text)?;
        let (record, strategy) = self.normalizer.structure_text(input, None).await;
        info!(strategy = %strategy, "Structured input text");
        Ok((record, strategy))
    }

    fn checked_input<'a>(&self, text: &'a str) -> Result<&'a str> {
        let input = text.trim();
        let length = char_len(input);
        if length < self.config.min_input_chars {
            return Err(ExtractionError::InsufficientInput {
                length,
                minimum: self.config.min_input_chars,
            }
            .into());
        }
        Ok(input)
    }

    /// Stylistic guidance shared by every summary request.
    fn guidance(&self) -> String {
        format!(
            "Write concise bullet points, preserve numeric values, at most {} bullets.",
            self.config.max_bullets
        )
    }

    async fn summarize_with_generator(&self, input: &str) -> Result<String> {
        let generator = self
            .capabilities
            .generator
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("generator"))?;
        let options = GenerateOptions::new(format!("You are a study assistant. {}", self.guidance()));

        if char_len(input) <= self.config.single_pass_chars {
            debug!(provider = generator.name(), "Single-pass summary");
            let prompt = format!("Summarize the following text.\n\n{input}");
            return Ok(generator.generate(&prompt, &options).await?);
        }

        let chunks = chunk_text(input, self.config.chunk_chars, self.config.chunk_overlap);
        let total = chunks.len();
        debug!(provider = generator.name(), chunks = total, "Chunked summary");

        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let prompt = format!(
                "Summarize part {} of {total} of a longer document.\n\n{chunk}",
                i + 1
            );
            partials.push(generator.generate(&prompt, &options).await?);
        }

        let prompt = format!(
            "Merge these partial summaries into one coherent summary. Remove duplicate points.\n\n{}",
            partials.join("\n\n")
        );
        Ok(generator.generate(&prompt, &options).await?)
    }

    async fn summarize_with_summarizer(&self, input: &str) -> Result<String> {
        let capability = self
            .capabilities
            .summarizer
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("summarizer"))?;
        let config = SummarizerConfig {
            summary_type: SummaryType::KeyPoints,
            format: SummaryFormat::Markdown,
            length: SummaryLength::Medium,
            shared_context: Some(SUMMARY_CONTEXT.to_string()),
        };
        let summarizer = ready_summarizer(capability.as_ref(), &config).await?;
        let guidance = self.guidance();

        if char_len(input) <= self.config.single_pass_chars {
            return summarize_once(summarizer.as_ref(), input, &guidance).await;
        }

        let chunks = chunk_text(input, self.config.chunk_chars, self.config.chunk_overlap);
        debug!(chunks = chunks.len(), "Chunked summary via summarizer");
        let mut partials = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            partials.push(summarize_once(summarizer.as_ref(), chunk, &guidance).await?);
        }
        let merge = format!("{guidance} Merge the partial summaries and remove duplicate points.");
        summarize_once(summarizer.as_ref(), &partials.join("\n"), &merge).await
    }
}

async fn summarize_once(summarizer: &dyn Summarizer, text: &str, guidance: &str) -> Result<String> {
    summarizer
        .summarize(text, Some(guidance))
        .await
        .map_err(StudyError::from)
}

/// Split `text` into character windows of `window` with `overlap` shared
/// between neighbours. The last window ends at the end of the text.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let window = window.max(1);
    let step = window.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
