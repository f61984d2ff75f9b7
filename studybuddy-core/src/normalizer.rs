//! Content normalizer: any saved artifact into the five-field record.
//!
//! Strategies run in fixed priority order and the first success wins:
//! generative-structured, then coerced-summary, then the keyword heuristic.
//! The heuristic has no failure mode, so the chain always yields a record.

use crate::capability::{
    Capabilities, GenerateOptions, SummarizerConfig, SummaryFormat, SummaryLength, SummaryType,
    ready_summarizer,
};
use crate::config::NormalizeConfig;
use crate::error::{CapabilityError, ParseError, Result};
use crate::text::{clamp_chars, clean_field, first_json_object, split_sentences};
use crate::types::{Artifact, ArtifactKind, FIELD_NAMES, NOT_AVAILABLE, StructuredRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Generative,
    CoercedSummary,
    Heuristic,
}

impl Strategy {
    /// Model-backed strategies in priority order. The heuristic is always the terminal step.
    pub const MODEL_CHAIN: [Strategy; 2] = [Strategy::Generative, Strategy::CoercedSummary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Generative => "generative",
            Strategy::CoercedSummary => "coerced_summary",
            Strategy::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working representation used by comparison and survey synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub title: String,
    pub fields: StructuredRecord,
}

impl NormalizedItem {
    /// Compact prompt block: title line followed by one line per field.
    pub fn prompt_block(&self, tag: usize) -> String {
        let mut block = format!("[{tag}] {}", self.title);
        for (name, value) in self.fields.entries() {
            block.push_str(&format!("\n{name}: {value}"));
        }
        block
    }
}

/// JSON schema constraining generated records to the five fields.
pub fn record_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for name in FIELD_NAMES {
        properties.insert(name.to_string(), json!({ "type": "string" }));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": FIELD_NAMES,
    })
}

const STRUCTURE_SYSTEM: &str = "You extract research notes into a fixed schema. \
Fill Objective, Method, Dataset, Results and Conclusion. Each field is at most two sentences. \
Use \"N/A\" when the text does not say. Preserve numeric values exactly.";

const STRUCTURE_JSON_INSTRUCTION: &str = "Respond with ONLY a JSON object with the keys \
\"Objective\", \"Method\", \"Dataset\", \"Results\", \"Conclusion\". \
Each value is at most two sentences; use \"N/A\" for unknown fields.";

/// Context passed to every summarizer call.
pub const SUMMARY_CONTEXT: &str = "Audience: student; concise.";

/// Converts artifacts and free text into `StructuredRecord`s.
pub struct ContentNormalizer {
    capabilities: Capabilities,
    config: NormalizeConfig,
}

impl ContentNormalizer {
    pub fn new(capabilities: Capabilities, config: NormalizeConfig) -> Self {
        Self {
            capabilities,
            config,
        }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalize an artifact into a record.
    ///
    /// Structured artifacts pass through unchanged. Everything else runs the
    /// strategy chain over its text with the normalization field bound.
    pub async fn normalize(&self, artifact: &Artifact) -> StructuredRecord {
        if artifact.kind == ArtifactKind::Structured {
            return artifact.fields.clone().unwrap_or_default();
        }
        let text = artifact.text.as_deref().unwrap_or_default();
        let (record, _) = self
            .structure_text(text, Some(self.config.field_limit))
            .await;
        record
    }

    /// Normalize an artifact into a titled, bounded item.
    pub async fn normalize_item(&self, artifact: &Artifact) -> NormalizedItem {
        let limit = Some(self.config.field_limit);
        let record = self.normalize(artifact).await;
        NormalizedItem {
            title: clean_field(&artifact.label(), limit),
            fields: record.map_fields(|v| clean_field(v, limit)),
        }
    }

    /// Normalize every artifact, preserving order.
    pub async fn normalize_all(&self, artifacts: &[Artifact]) -> Vec<NormalizedItem> {
        let mut items = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            items.push(self.normalize_item(artifact).await);
        }
        items
    }

    /// Run the strategy chain over free text. `limit` bounds each field in
    /// characters; `None` leaves fields unbounded.
    pub async fn structure_text(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> (StructuredRecord, Strategy) {
        for strategy in Strategy::MODEL_CHAIN {
            let attempt = match strategy {
                Strategy::Generative => self.try_generative(text, limit).await,
                Strategy::CoercedSummary => self.try_coerced(text, limit).await,
                Strategy::Heuristic => break,
            };
            match attempt {
                Ok(record) => {
                    debug!(strategy = %strategy, "Structured text");
                    return (record, strategy);
                }
                Err(e) => debug!(strategy = %strategy, error = %e, "Strategy failed, trying next"),
            }
        }
        let record = heuristic_record(text, self.config.max_sentences, limit);
        (record, Strategy::Heuristic)
    }

    async fn try_generative(&self, text: &str, limit: Option<usize>) -> Result<StructuredRecord> {
        let generator = self
            .capabilities
            .generator
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("generator"))?;

        let prompt = format!(
            "Extract the research fields from this text.\n\nTEXT:\n{}",
            clamp_chars(text, self.config.max_prompt_chars)
        );
        let options = GenerateOptions::new(STRUCTURE_SYSTEM).with_schema(record_schema());
        let output = generator.generate(&prompt, &options).await.map_err(|e| {
            warn!(provider = generator.name(), error = %e, "Generation failed");
            e
        })?;
        Ok(decode_record(&output, limit)?)
    }

    async fn try_coerced(&self, text: &str, limit: Option<usize>) -> Result<StructuredRecord> {
        let capability = self
            .capabilities
            .summarizer
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("summarizer"))?;

        let config = SummarizerConfig {
            summary_type: SummaryType::KeyPoints,
            format: SummaryFormat::PlainText,
            length: SummaryLength::Medium,
            shared_context: Some(SUMMARY_CONTEXT.to_string()),
        };
        let summarizer = ready_summarizer(capability.as_ref(), &config).await?;
        let input = format!(
            "{}\n\n{}",
            clamp_chars(text, self.config.max_prompt_chars),
            STRUCTURE_JSON_INSTRUCTION
        );
        let output = summarizer
            .summarize(&input, Some(STRUCTURE_JSON_INSTRUCTION))
            .await?;
        let block = first_json_object(&output).ok_or(ParseError::NoJsonBlock)?;
        Ok(decode_record(block, limit)?)
    }
}

/// Decode model output into a record.
///
/// The output must contain a JSON object carrying all five keys. Strings are
/// taken as-is, arrays are joined with `"; "`, other scalars are stringified.
pub fn decode_record(
    output: &str,
    limit: Option<usize>,
) -> std::result::Result<StructuredRecord, ParseError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let block = first_json_object(trimmed).ok_or(ParseError::NoJsonBlock)?;
    let value: Value = serde_json::from_str(block).map_err(|e| ParseError::Malformed {
        message: e.to_string(),
    })?;
    let object = value.as_object().ok_or_else(|| ParseError::Malformed {
        message: "expected a JSON object".to_string(),
    })?;

    let mut values = Vec::with_capacity(FIELD_NAMES.len());
    for name in FIELD_NAMES {
        let field = object.get(name).ok_or_else(|| ParseError::MissingField {
            field: name.to_string(),
        })?;
        values.push(clean_field(&value_to_text(field), limit));
    }
    let [objective, method, dataset, results, conclusion]: [String; 5] =
        values.try_into().map_err(|_| ParseError::Malformed {
            message: "unexpected field count".to_string(),
        })?;
    Ok(StructuredRecord {
        objective,
        method,
        dataset,
        results,
        conclusion,
    })
}

/// Flatten a JSON value into display text.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

struct FieldPatterns {
    objective: Regex,
    method: Regex,
    dataset: Regex,
    results: Regex,
}

static PATTERNS: LazyLock<FieldPatterns> = LazyLock::new(|| FieldPatterns {
    objective: Regex::new(r"(?i)\b(goals?|aims?|purpose|objectives?|we (investigate|study|propose))\b")
        .expect("objective pattern"),
    method: Regex::new(r"(?i)\b(methods?|approach|architecture|we (use|used|trained))\b")
        .expect("method pattern"),
    dataset: Regex::new(
        r"(?i)\b(datasets?|corpus|corpora|samples?|benchmarks?|imagenet|cifar(-?10|-?100)?|mnist|coco|squad|glue|wikitext|librispeech)\b",
    )
    .expect("dataset pattern"),
    results: Regex::new(
        r"(?i)(\b(results?|accuracy|auc|f1|bleu|rouge|psnr|ssim|precision|recall|significant(ly)?)\b|%)",
    )
    .expect("results pattern"),
});

/// Deterministic keyword extraction.
///
/// Considers the first `max_sentences` sentences. Each content field takes
/// the first sentence matching its pattern, else a fixed positional sentence
/// (0, 1, 2, 3). Conclusion is the last two sentences joined.
pub fn heuristic_record(text: &str, max_sentences: usize, limit: Option<usize>) -> StructuredRecord {
    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .take(max_sentences)
        .collect();

    let pick = |pattern: &Regex, position: usize| -> String {
        sentences
            .iter()
            .find(|s| pattern.is_match(s))
            .or_else(|| sentences.get(position))
            .map(|s| clean_field(s, limit))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    let patterns = &*PATTERNS;
    let conclusion = match sentences.len() {
        0 => NOT_AVAILABLE.to_string(),
        n => clean_field(&sentences[n.saturating_sub(2)..].join(" "), limit),
    };

    StructuredRecord {
        objective: pick(&patterns.objective, 0),
        method: pick(&patterns.method, 1),
        dataset: pick(&patterns.dataset, 2),
        results: pick(&patterns.results, 3),
        conclusion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Availability, MockGenerator, MockSummarization};
    use crate::types::ArtifactSource;
    use std::sync::Arc;

    const PAPER: &str = "The goal of this work is robust image classification. \
        We trained a ResNet-50 with heavy augmentation. \
        Experiments use the CIFAR-10 dataset. \
        The model reaches 92% accuracy. \
        Augmentation matters most for small models. \
        Future work will explore transformers.";

    fn normalizer(caps: Capabilities) -> ContentNormalizer {
        ContentNormalizer::new(caps, NormalizeConfig::default())
    }

    #[test]
    fn test_heuristic_keyword_matches() {
        let record = heuristic_record(PAPER, 30, None);
        assert!(record.objective.starts_with("The goal"));
        assert!(record.method.starts_with("We trained"));
        assert!(record.dataset.contains("CIFAR-10"));
        assert!(record.results.contains("92%"));
        assert_eq!(
            record.conclusion,
            "Augmentation matters most for small models. Future work will explore transformers."
        );
    }

    #[test]
    fn test_heuristic_method_ignores_passive_trained() {
        let text = "Our aim is robust parsing. The network was trained for ten epochs. \
                    We adopt a new architecture here. Nothing else.";
        let record = heuristic_record(text, 30, None);
        assert_eq!(record.method, "We adopt a new architecture here.");
    }

    #[test]
    fn test_heuristic_positional_fallback() {
        let text = "Alpha one. Beta two. Gamma three. Delta four. Epsilon five.";
        let record = heuristic_record(text, 30, None);
        assert_eq!(record.objective, "Alpha one.");
        assert_eq!(record.method, "Beta two.");
        assert_eq!(record.dataset, "Gamma three.");
        assert_eq!(record.results, "Delta four.");
        assert_eq!(record.conclusion, "Delta four. Epsilon five.");
    }

    #[test]
    fn test_heuristic_short_text_uses_not_available() {
        let record = heuristic_record("Only one sentence here", 30, None);
        assert_eq!(record.objective, "Only one sentence here");
        assert_eq!(record.method, NOT_AVAILABLE);
        assert_eq!(record.dataset, NOT_AVAILABLE);
        assert_eq!(record.results, NOT_AVAILABLE);
        assert_eq!(record.conclusion, "Only one sentence here");

        let empty = heuristic_record("", 30, None);
        assert_eq!(empty, StructuredRecord::default());
    }

    #[test]
    fn test_heuristic_respects_limit_and_sentence_cap() {
        let long = format!("{} end.", "word ".repeat(200));
        let record = heuristic_record(&long, 30, Some(50));
        assert!(record.objective.chars().count() <= 50);

        let many: String = (0..40).map(|i| format!("Sentence {i}. ")).collect();
        let record = heuristic_record(&many, 30, None);
        assert_eq!(record.conclusion, "Sentence 28. Sentence 29.");
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        assert_eq!(
            heuristic_record(PAPER, 30, Some(500)),
            heuristic_record(PAPER, 30, Some(500))
        );
    }

    #[test]
    fn test_decode_record_requires_all_fields() {
        let err = decode_record(r#"{"Objective":"o","Method":"m"}"#, None).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { .. }));
        assert!(matches!(decode_record("", None), Err(ParseError::Empty)));
        assert!(matches!(
            decode_record("no json here", None),
            Err(ParseError::NoJsonBlock)
        ));
        assert!(matches!(
            decode_record("{\"Objective\": }", None),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_record_coerces_values() {
        let record = decode_record(
            r#"Here: {"Objective":"  find  x ","Method":["a","b"],"Dataset":"","Results":92,"Conclusion":null}"#,
            None,
        )
        .unwrap();
        assert_eq!(record.objective, "find x");
        assert_eq!(record.method, "a; b");
        assert_eq!(record.dataset, NOT_AVAILABLE);
        assert_eq!(record.results, "92");
        assert_eq!(record.conclusion, NOT_AVAILABLE);
    }

    #[test]
    fn test_record_schema_lists_required_fields() {
        let schema = record_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
        assert_eq!(schema["properties"]["Results"]["type"], "string");
    }

    #[tokio::test]
    async fn test_structured_artifact_passes_through() {
        let fields = StructuredRecord::new("o", "m", "d", "r", "c");
        let artifact = Artifact::structured(fields.clone(), ArtifactSource::Textbox);
        let generator = Arc::new(MockGenerator::with_response("{}"));
        let n = normalizer(Capabilities::none().with_generator(generator.clone()));
        assert_eq!(n.normalize(&artifact).await, fields);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generative_strategy_wins() {
        let generator = Arc::new(MockGenerator::with_response(
            r#"{"Objective":"o","Method":"m","Dataset":"d","Results":"r","Conclusion":"c"}"#,
        ));
        let n = normalizer(Capabilities::none().with_generator(generator));
        let (record, strategy) = n.structure_text(PAPER, None).await;
        assert_eq!(strategy, Strategy::Generative);
        assert_eq!(record, StructuredRecord::new("o", "m", "d", "r", "c"));
    }

    #[tokio::test]
    async fn test_malformed_generation_falls_to_coerced() {
        let caps = Capabilities::none()
            .with_generator(Arc::new(MockGenerator::with_response("not json")))
            .with_summarizer(Arc::new(MockSummarization::ready(
                "Sure. {\"Objective\":\"o\",\"Method\":\"m\",\"Dataset\":\"d\",\"Results\":\"r\",\"Conclusion\":\"c\"} done",
            )));
        let (record, strategy) = normalizer(caps).structure_text(PAPER, None).await;
        assert_eq!(strategy, Strategy::CoercedSummary);
        assert_eq!(record.results, "r");
    }

    #[tokio::test]
    async fn test_unready_summarizer_falls_to_heuristic() {
        let caps = Capabilities::none().with_summarizer(Arc::new(
            MockSummarization::with_availability(Availability::Downloading),
        ));
        let (record, strategy) = normalizer(caps).structure_text(PAPER, None).await;
        assert_eq!(strategy, Strategy::Heuristic);
        assert_eq!(record, heuristic_record(PAPER, 30, None));
    }

    #[tokio::test]
    async fn test_normalize_item_bounds_fields() {
        let text = format!("{}.", "x".repeat(900));
        let artifact = Artifact::raw(text, ArtifactSource::Page).with_title("Long");
        let item = normalizer(Capabilities::none()).normalize_item(&artifact).await;
        assert_eq!(item.title, "Long");
        for (_, value) in item.fields.entries() {
            assert!(value.chars().count() <= 500);
            assert!(!value.is_empty());
        }
    }
}
