//! Comparison engine over two or more saved artifacts.

use crate::capability::{
    Capabilities, GenerateOptions, SummarizerConfig, SummaryFormat, SummaryLength, SummaryType,
    ready_summarizer,
};
use crate::error::{CapabilityError, ExtractionError, ParseError, Result};
use crate::normalizer::{ContentNormalizer, NormalizedItem, SUMMARY_CONTEXT, Strategy};
use crate::text::{distinct_tokens, first_json_object};
use crate::types::{Artifact, NOT_AVAILABLE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Minimum number of artifacts for a comparison or survey.
pub const MIN_ITEMS: usize = 2;
/// Generated comparisons keep at most this many bullets across all lists.
pub const MAX_BULLETS: usize = 10;
const MAX_COMMON: usize = 5;
const MAX_UNIQUE: usize = 3;

/// Phrases that mark a study as weak or risky.
pub const RISK_KEYWORDS: [&str; 11] = [
    "pilot",
    "small sample",
    "subset",
    "synthetic",
    "no baseline",
    "not significant",
    "missing",
    "overfit",
    "leak",
    "no cross-validation",
    "imbalanced",
];

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent pattern"));

fn default_strategy() -> Strategy {
    Strategy::Heuristic
}

/// Structured comparison of normalized items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub common: Vec<String>,
    #[serde(default)]
    pub differences: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default, rename = "bestFor", alias = "best_for")]
    pub best_for: Vec<String>,
    #[serde(skip, default = "default_strategy")]
    pub strategy: Strategy,
}

impl Comparison {
    fn bullet_count(&self) -> usize {
        self.common.len() + self.differences.len() + self.flags.len() + self.best_for.len()
    }

    /// Trim the lists, in order, so the total stays within `max`.
    fn cap_bullets(&mut self, max: usize) {
        let mut budget = max;
        for list in [
            &mut self.common,
            &mut self.differences,
            &mut self.flags,
            &mut self.best_for,
        ] {
            list.truncate(budget);
            budget -= list.len();
        }
    }

    /// Render as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.summary.trim().is_empty() {
            out.push_str(self.summary.trim());
            out.push_str("\n\n");
        }
        for (heading, list) in [
            ("Common findings", &self.common),
            ("Key differences", &self.differences),
            ("Quality flags", &self.flags),
            ("Best for", &self.best_for),
        ] {
            out.push_str(&format!("### {heading}\n"));
            if list.is_empty() {
                out.push_str("- None\n");
            }
            for entry in list {
                out.push_str(&format!("- {entry}\n"));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// JSON schema for generated comparisons.
pub fn comparison_schema() -> Value {
    let list = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "common": list,
            "differences": list,
            "flags": list,
            "bestFor": list,
        },
        "required": ["summary", "common", "differences", "flags", "bestFor"],
    })
}

const COMPARE_SYSTEM: &str = "You compare research notes. Use at most 10 bullets across all lists. \
Preserve numeric values exactly. Prefer field-by-field contrasts (Objective, Method, Dataset, \
Results, Conclusion). Only use the material given.";

const COMPARE_JSON_INSTRUCTION: &str = "Respond with ONLY a JSON object with the keys \
\"summary\" (markdown string), \"common\", \"differences\", \"flags\" and \"bestFor\" \
(arrays of strings).";

/// Compares normalized artifacts with a model, falling back to token heuristics.
pub struct ComparisonEngine {
    capabilities: Capabilities,
    normalizer: Arc<ContentNormalizer>,
}

impl ComparisonEngine {
    pub fn new(capabilities: Capabilities, normalizer: Arc<ContentNormalizer>) -> Self {
        Self {
            capabilities,
            normalizer,
        }
    }

    /// Compare at least two artifacts.
    pub async fn compare(&self, artifacts: &[Artifact]) -> Result<Comparison> {
        if artifacts.len() < MIN_ITEMS {
            return Err(ExtractionError::NotEnoughArtifacts {
                found: artifacts.len(),
                required: MIN_ITEMS,
            }
            .into());
        }
        let items = self.normalizer.normalize_all(artifacts).await;
        let prompt = comparison_prompt(&items);

        for strategy in Strategy::MODEL_CHAIN {
            let attempt = match strategy {
                Strategy::Generative => self.try_generative(&prompt).await,
                Strategy::CoercedSummary => self.try_coerced(&prompt).await,
                Strategy::Heuristic => break,
            };
            match attempt {
                Ok(mut comparison) => {
                    comparison.strategy = strategy;
                    info!(strategy = %strategy, items = items.len(), "Compared artifacts");
                    return Ok(comparison);
                }
                Err(e) => debug!(strategy = %strategy, error = %e, "Comparison strategy failed"),
            }
        }

        let comparison = heuristic_comparison(&items);
        info!(strategy = %comparison.strategy, items = items.len(), "Compared artifacts");
        Ok(comparison)
    }

    async fn try_generative(&self, prompt: &str) -> Result<Comparison> {
        let generator = self
            .capabilities
            .generator
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("generator"))?;
        let options = GenerateOptions::new(COMPARE_SYSTEM).with_schema(comparison_schema());
        let output = generator.generate(prompt, &options).await?;
        Ok(decode_comparison(&output)?)
    }

    async fn try_coerced(&self, prompt: &str) -> Result<Comparison> {
        let capability = self
            .capabilities
            .summarizer
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("summarizer"))?;
        let config = SummarizerConfig {
            summary_type: SummaryType::KeyPoints,
            format: SummaryFormat::PlainText,
            length: SummaryLength::Long,
            shared_context: Some(SUMMARY_CONTEXT.to_string()),
        };
        let summarizer = ready_summarizer(capability.as_ref(), &config).await?;
        let input = format!("{prompt}\n\n{COMPARE_JSON_INSTRUCTION}");
        let output = summarizer
            .summarize(&input, Some(COMPARE_JSON_INSTRUCTION))
            .await?;
        Ok(decode_comparison(&output)?)
    }
}

fn comparison_prompt(items: &[NormalizedItem]) -> String {
    let blocks: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| item.prompt_block(i + 1))
        .collect();
    format!(
        "Compare these {} research items.\n\n{}",
        items.len(),
        blocks.join("\n\n")
    )
}

/// Decode model output into a comparison, capped at `MAX_BULLETS` bullets.
pub fn decode_comparison(output: &str) -> std::result::Result<Comparison, ParseError> {
    let block = first_json_object(output.trim()).ok_or(ParseError::NoJsonBlock)?;
    let mut comparison: Comparison =
        serde_json::from_str(block).map_err(|e| ParseError::Malformed {
            message: e.to_string(),
        })?;
    for list in [
        &mut comparison.common,
        &mut comparison.differences,
        &mut comparison.flags,
        &mut comparison.best_for,
    ] {
        list.retain(|entry| !entry.trim().is_empty());
    }
    if comparison.summary.trim().is_empty() && comparison.bullet_count() == 0 {
        return Err(ParseError::Empty);
    }
    comparison.cap_bullets(MAX_BULLETS);
    Ok(comparison)
}

/// Shared and distinctive tokens across per-item token sets.
///
/// `common` holds tokens of the first set also present in the second (at most
/// five); each entry of the second value holds the tokens found in no other
/// set (at most three), in first-seen order.
pub fn compare_token_sets(sets: &[Vec<String>]) -> (Vec<String>, Vec<Vec<String>>) {
    let lookup: Vec<HashSet<&str>> = sets
        .iter()
        .map(|s| s.iter().map(String::as_str).collect())
        .collect();

    let common = match (sets.first(), lookup.get(1)) {
        (Some(first), Some(second)) => first
            .iter()
            .filter(|t| second.contains(t.as_str()))
            .take(MAX_COMMON)
            .cloned()
            .collect(),
        _ => Vec::new(),
    };

    let unique = sets
        .iter()
        .enumerate()
        .map(|(i, set)| {
            set.iter()
                .filter(|t| {
                    lookup
                        .iter()
                        .enumerate()
                        .all(|(j, other)| j == i || !other.contains(t.as_str()))
                })
                .take(MAX_UNIQUE)
                .cloned()
                .collect()
        })
        .collect();

    (common, unique)
}

/// Risk keywords found in `text`, in keyword order.
pub fn risk_flags(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    RISK_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| lower.contains(kw))
        .collect()
}

/// Highest percentage mentioned in `text`.
pub fn max_percentage(text: &str) -> Option<f64> {
    PERCENT
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .fold(None, |best, v| match best {
            Some(b) if b >= v => Some(b),
            _ => Some(v),
        })
}

/// Deterministic comparison built from token overlap and keyword scans.
pub fn heuristic_comparison(items: &[NormalizedItem]) -> Comparison {
    let sets: Vec<Vec<String>> = items
        .iter()
        .map(|item| distinct_tokens(&item.fields.joined()))
        .collect();
    let (common, unique) = compare_token_sets(&sets);

    let differences: Vec<String> = items
        .iter()
        .zip(&unique)
        .filter(|(_, tokens)| !tokens.is_empty())
        .map(|(item, tokens)| format!("{}: {}", item.title, tokens.join(", ")))
        .collect();

    let flags: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let hits = risk_flags(&format!("{} {}", item.fields.method, item.fields.results));
            (!hits.is_empty()).then(|| format!("{}: {}", item.title, hits.join(", ")))
        })
        .collect();

    let mut best_for = Vec::new();
    let mut best_accuracy: Option<(usize, f64)> = None;
    for (i, item) in items.iter().enumerate() {
        if let Some(pct) = max_percentage(&item.fields.results)
            && best_accuracy.is_none_or(|(_, best)| pct > best)
        {
            best_accuracy = Some((i, pct));
        }
    }
    if let Some((i, pct)) = best_accuracy {
        best_for.push(format!("{}: best for accuracy ({pct}%)", items[i].title));
    }

    let quickest = items
        .iter()
        .filter(|item| item.fields.method != NOT_AVAILABLE)
        .min_by_key(|item| item.fields.method.chars().count());
    if let Some(item) = quickest {
        best_for.push(format!("{}: best for quick baseline", item.title));
    }

    let summary = if common.is_empty() {
        format!("Compared {} items; no shared key terms found.", items.len())
    } else {
        format!(
            "Compared {} items; shared key terms: {}.",
            items.len(),
            common.join(", ")
        )
    };

    Comparison {
        summary,
        common,
        differences,
        flags,
        best_for,
        strategy: Strategy::Heuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MockGenerator, MockSummarization};
    use crate::config::NormalizeConfig;
    use crate::types::{ArtifactSource, StructuredRecord};

    fn item(title: &str, method: &str, results: &str) -> NormalizedItem {
        NormalizedItem {
            title: title.to_string(),
            fields: StructuredRecord::new("N/A", method, "N/A", results, "N/A"),
        }
    }

    fn engine(caps: Capabilities) -> ComparisonEngine {
        let normalizer = Arc::new(ContentNormalizer::new(
            caps.clone(),
            NormalizeConfig::default(),
        ));
        ComparisonEngine::new(caps, normalizer)
    }

    fn set(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_token_set_common_and_differences() {
        let (common, unique) = compare_token_sets(&[
            set(&["cnn", "accuracy", "cifar"]),
            set(&["vit", "accuracy", "imagenet"]),
        ]);
        assert_eq!(common, vec!["accuracy"]);
        assert_eq!(unique[0], vec!["cnn", "cifar"]);
        assert_eq!(unique[1], vec!["vit", "imagenet"]);
    }

    #[test]
    fn test_token_set_caps() {
        let a = set(&["aaaa", "bbbb", "cccc", "dddd", "eeee", "ffff", "gggg"]);
        let b = a.clone();
        let c = set(&["h1h1", "h2h2", "h3h3", "h4h4"]);
        let (common, unique) = compare_token_sets(&[a, b, c]);
        assert_eq!(common.len(), 5);
        assert!(unique[0].is_empty());
        assert_eq!(unique[2].len(), 3);
    }

    #[test]
    fn test_heuristic_skips_empty_differences() {
        let items = vec![
            item("A", "same words here", "same words here"),
            item("B", "same words here", "same words here"),
        ];
        let comparison = heuristic_comparison(&items);
        assert!(comparison.differences.is_empty());
        assert_eq!(comparison.common, vec!["same", "words", "here"]);
    }

    #[test]
    fn test_risk_flags() {
        assert_eq!(
            risk_flags("A pilot study on a Small Sample with no cross-validation"),
            vec!["pilot", "small sample", "no cross-validation"]
        );
        assert!(risk_flags("Full benchmark evaluation").is_empty());
    }

    #[test]
    fn test_max_percentage() {
        assert_eq!(max_percentage("88% then 92.5 % then 90%"), Some(92.5));
        assert_eq!(max_percentage("no numbers"), None);
    }

    #[test]
    fn test_best_for_accuracy_first_on_ties() {
        let items = vec![
            item("A", "long method description", "91%"),
            item("B", "short", "93%"),
            item("C", "medium method", "93%"),
        ];
        let comparison = heuristic_comparison(&items);
        assert_eq!(comparison.best_for[0], "B: best for accuracy (93%)");
        assert_eq!(comparison.best_for[1], "B: best for quick baseline");
    }

    #[test]
    fn test_quick_baseline_ignores_not_available() {
        let items = vec![item("A", "N/A", "n/a"), item("B", "logistic regression", "n/a")];
        let comparison = heuristic_comparison(&items);
        assert_eq!(comparison.best_for, vec!["B: best for quick baseline"]);
    }

    #[test]
    fn test_heuristic_flags_items() {
        let items = vec![
            item("A", "pilot with synthetic data", "80%"),
            item("B", "full training", "81%"),
        ];
        let comparison = heuristic_comparison(&items);
        assert_eq!(comparison.flags, vec!["A: pilot, synthetic"]);
    }

    #[test]
    fn test_decode_comparison_caps_bullets() {
        let output = json!({
            "summary": "s",
            "common": ["c1", "c2", "c3", "c4", "c5", "c6"],
            "differences": ["d1", "d2", "d3"],
            "flags": ["f1", "f2"],
            "bestFor": ["b1"],
        })
        .to_string();
        let comparison = decode_comparison(&output).unwrap();
        assert_eq!(comparison.bullet_count(), MAX_BULLETS);
        assert_eq!(comparison.common.len(), 6);
        assert_eq!(comparison.differences.len(), 3);
        assert_eq!(comparison.flags, vec!["f1"]);
        assert!(comparison.best_for.is_empty());
    }

    #[test]
    fn test_decode_comparison_rejects_empty_and_malformed() {
        assert!(matches!(
            decode_comparison("{}"),
            Err(ParseError::Empty)
        ));
        assert!(matches!(
            decode_comparison(r#"{"common": "not a list"}"#),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            decode_comparison("plain text"),
            Err(ParseError::NoJsonBlock)
        ));
    }

    #[test]
    fn test_markdown_sections() {
        let comparison = heuristic_comparison(&[
            item("A", "convolutional network", "92%"),
            item("B", "vision transformer", "95%"),
        ]);
        let md = comparison.to_markdown();
        for heading in ["Common findings", "Key differences", "Quality flags", "Best for"] {
            assert!(md.contains(&format!("### {heading}")));
        }
        assert!(md.contains("B: best for accuracy (95%)"));
    }

    #[test]
    fn test_serializes_best_for_key() {
        let comparison = heuristic_comparison(&[item("A", "x", "1%"), item("B", "y", "2%")]);
        let value = serde_json::to_value(&comparison).unwrap();
        assert!(value.get("bestFor").is_some());
        assert!(value.get("strategy").is_none());
    }

    #[tokio::test]
    async fn test_compare_requires_two_artifacts() {
        let one = vec![Artifact::raw("only one", ArtifactSource::Textbox)];
        let err = engine(Capabilities::none()).compare(&one).await.unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[tokio::test]
    async fn test_compare_without_capabilities_is_total() {
        let artifacts = vec![
            Artifact::raw("We trained a CNN on CIFAR-10. Accuracy reached 92%.", ArtifactSource::Textbox),
            Artifact::raw("We trained a ViT on ImageNet. Accuracy reached 88%.", ArtifactSource::Page),
        ];
        let comparison = engine(Capabilities::none()).compare(&artifacts).await.unwrap();
        assert_eq!(comparison.strategy, Strategy::Heuristic);
        assert!(comparison.common.contains(&"trained".to_string()));
        assert!(comparison.common.contains(&"accuracy".to_string()));
    }

    #[tokio::test]
    async fn test_compare_generative_then_coerced() {
        let generated = json!({
            "summary": "Both are image models.",
            "common": ["image classification"],
            "differences": ["A uses CNN"],
            "flags": [],
            "bestFor": ["B for accuracy"],
        })
        .to_string();
        let artifacts = vec![
            Artifact::structured(StructuredRecord::new("o", "cnn", "d", "92%", "c"), ArtifactSource::Textbox),
            Artifact::structured(StructuredRecord::new("o", "vit", "d", "95%", "c"), ArtifactSource::Textbox),
        ];

        let generator = Arc::new(MockGenerator::with_response(&generated));
        let comparison = engine(Capabilities::none().with_generator(generator.clone()))
            .compare(&artifacts)
            .await
            .unwrap();
        assert_eq!(comparison.strategy, Strategy::Generative);
        assert_eq!(comparison.best_for, vec!["B for accuracy"]);
        assert!(generator.prompts()[0].contains("Method: cnn"));

        let caps = Capabilities::none()
            .with_generator(Arc::new(MockGenerator::failing()))
            .with_summarizer(Arc::new(MockSummarization::ready(&format!("Result: {generated}"))));
        let comparison = engine(caps).compare(&artifacts).await.unwrap();
        assert_eq!(comparison.strategy, Strategy::CoercedSummary);
    }
}
