//! Survey synthesis: a long-form markdown document over selected artifacts.
//!
//! A text generator writes the survey when one is available. Otherwise a
//! deterministic template builds it from frequency tables and per-item blocks.

use crate::capability::{Capabilities, GenerateOptions};
use crate::compare::MIN_ITEMS;
use crate::config::SurveyConfig;
use crate::error::{CapabilityError, ExtractionError, ParseError, Result};
use crate::normalizer::{ContentNormalizer, NormalizedItem, Strategy};
use crate::text::{clamp_chars, collapse_whitespace};
use crate::types::{Artifact, ArtifactKind, NOT_AVAILABLE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Sections a generated survey must contain, in order.
pub const SURVEY_SECTIONS: [&str; 8] = [
    "Introduction",
    "Common Findings",
    "Key Differences",
    "Datasets & Metrics",
    "Quality Flags / Limitations",
    "Gaps & Future Work",
    "Recommendations",
    "References",
];

/// Metric names counted in Results fields.
pub const METRIC_NAMES: [&str; 9] = [
    "AUC",
    "F1",
    "BLEU",
    "ROUGE",
    "PSNR",
    "SSIM",
    "Accuracy",
    "Recall",
    "Precision",
];

static TERM_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:[;,/]|\band\b|\bwith\b|\busing\b)\s*").expect("separator pattern")
});

static EMBEDDED_NOT_AVAILABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bn/a\b").expect("n/a pattern"));

static METRIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(AUC|F1|BLEU|ROUGE|PSNR|SSIM|Accuracy|Recall|Precision)\b")
        .expect("metric pattern")
});

/// A synthesized survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyDocument {
    pub title: String,
    pub markdown: String,
    pub strategy: Strategy,
    pub sources: usize,
}

impl SurveyDocument {
    /// Convert into a persistable `survey` artifact.
    pub fn into_artifact(self) -> Artifact {
        Artifact::survey(self.markdown).with_title(self.title)
    }
}

const SURVEY_SYSTEM: &str = "You write concise literature surveys for students. \
Use only the material provided and never invent sources. Cite items by their tag, e.g. [1], [2]. \
Preserve numeric values exactly.";

pub struct SurveySynthesizer {
    capabilities: Capabilities,
    normalizer: Arc<ContentNormalizer>,
    config: SurveyConfig,
}

impl SurveySynthesizer {
    pub fn new(
        capabilities: Capabilities,
        normalizer: Arc<ContentNormalizer>,
        config: SurveyConfig,
    ) -> Self {
        Self {
            capabilities,
            normalizer,
            config,
        }
    }

    /// Synthesize a survey over at least two artifacts.
    pub async fn synthesize(&self, artifacts: &[Artifact]) -> Result<SurveyDocument> {
        if artifacts.len() < MIN_ITEMS {
            return Err(ExtractionError::NotEnoughArtifacts {
                found: artifacts.len(),
                required: MIN_ITEMS,
            }
            .into());
        }
        let title = format!("Literature survey of {} sources", artifacts.len());

        match self.try_generative(artifacts).await {
            Ok(markdown) => {
                info!(sources = artifacts.len(), "Generated survey");
                return Ok(SurveyDocument {
                    title,
                    markdown,
                    strategy: Strategy::Generative,
                    sources: artifacts.len(),
                });
            }
            Err(e) => debug!(error = %e, "Generative survey failed, using template"),
        }

        let items = self.normalizer.normalize_all(artifacts).await;
        let markdown = template_survey(&title, &items, self.config.top_n);
        info!(sources = artifacts.len(), "Built template survey");
        Ok(SurveyDocument {
            title,
            markdown,
            strategy: Strategy::Heuristic,
            sources: artifacts.len(),
        })
    }

    async fn try_generative(&self, artifacts: &[Artifact]) -> Result<String> {
        let generator = self
            .capabilities
            .generator
            .as_ref()
            .ok_or_else(|| CapabilityError::unavailable("generator"))?;
        let prompt = self.survey_prompt(artifacts);
        let output = generator
            .generate(&prompt, &GenerateOptions::new(SURVEY_SYSTEM))
            .await?;
        let markdown = output.trim();
        if markdown.is_empty() {
            return Err(ParseError::Empty.into());
        }
        Ok(markdown.to_string())
    }

    fn survey_prompt(&self, artifacts: &[Artifact]) -> String {
        let material: Vec<String> = artifacts
            .iter()
            .enumerate()
            .map(|(i, artifact)| {
                let tag = i + 1;
                match (&artifact.kind, &artifact.fields) {
                    (ArtifactKind::Structured, Some(fields)) => NormalizedItem {
                        title: artifact.label(),
                        fields: fields.clone(),
                    }
                    .prompt_block(tag),
                    _ => {
                        let text = collapse_whitespace(artifact.text.as_deref().unwrap_or_default());
                        format!(
                            "[{tag}] {}\nText: {}",
                            artifact.label(),
                            clamp_chars(&text, self.config.raw_excerpt_chars)
                        )
                    }
                }
            })
            .collect();

        format!(
            "Write a markdown literature survey with these sections in order: {}.\n\
             Cite items as [1], [2], ... and list them under References.\n\nMATERIAL:\n\n{}",
            SURVEY_SECTIONS.join(", "),
            material.join("\n\n")
        )
    }
}

/// Split a field into terms on `;` `,` `/` and the words "and", "with", "using".
/// `N/A` placeholders are never terms, even inside a longer field.
pub fn split_terms(field: &str) -> Vec<String> {
    let field = EMBEDDED_NOT_AVAILABLE.replace_all(field, ";");
    TERM_SEPARATOR
        .split(&field)
        .map(|t| t.trim().trim_end_matches('.').trim().to_string())
        .filter(|t| !t.is_empty() && t != NOT_AVAILABLE)
        .collect()
}

/// Count terms case-insensitively. Returns at most `top_n` rows by
/// descending count; ties keep first-seen order and the first-seen spelling.
pub fn term_frequencies<'a>(
    fields: impl IntoIterator<Item = &'a str>,
    top_n: usize,
) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for field in fields {
        for term in split_terms(field) {
            let key = term.to_lowercase();
            match index.get(&key) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(key, order.len());
                    order.push((term, 1));
                }
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(top_n);
    order
}

/// Mentions of each recognized metric, most frequent first. Metrics never
/// mentioned are omitted.
pub fn metric_mentions<'a>(results: impl IntoIterator<Item = &'a str>) -> Vec<(&'static str, usize)> {
    let mut counts = [0usize; METRIC_NAMES.len()];
    for text in results {
        for m in METRIC.find_iter(text) {
            if let Some(i) = METRIC_NAMES
                .iter()
                .position(|name| name.eq_ignore_ascii_case(m.as_str()))
            {
                counts[i] += 1;
            }
        }
    }
    let mut rows: Vec<(&'static str, usize)> = METRIC_NAMES
        .iter()
        .copied()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows
}

fn frequency_table(out: &mut String, heading: &str, column: &str, rows: &[(String, usize)]) {
    out.push_str(&format!("## {heading}\n\n"));
    if rows.is_empty() {
        out.push_str("No entries.\n\n");
        return;
    }
    out.push_str(&format!("| {column} | Count |\n|---|---|\n"));
    for (term, count) in rows {
        out.push_str(&format!("| {term} | {count} |\n"));
    }
    out.push('\n');
}

/// Deterministic survey built from normalized items.
pub fn template_survey(title: &str, items: &[NormalizedItem], top_n: usize) -> String {
    let mut out = format!("# {title}\n\n");

    out.push_str("## Bibliography\n\n");
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, item.title));
    }
    out.push('\n');

    let methods = term_frequencies(items.iter().map(|i| i.fields.method.as_str()), top_n);
    frequency_table(&mut out, "Methods", "Method", &methods);

    let datasets = term_frequencies(items.iter().map(|i| i.fields.dataset.as_str()), top_n);
    frequency_table(&mut out, "Datasets", "Dataset", &datasets);

    let metrics: Vec<(String, usize)> =
        metric_mentions(items.iter().map(|i| i.fields.results.as_str()))
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();
    frequency_table(&mut out, "Metrics mentioned", "Metric", &metrics);

    out.push_str("## Items\n\n");
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("### [{}] {}\n\n", i + 1, item.title));
        for (name, value) in item.fields.entries() {
            out.push_str(&format!("- **{name}**: {value}\n"));
        }
        out.push('\n');
    }

    out.push_str(
        "## Synthesis\n\n\
         The items above are compared field by field. Methods and datasets that recur across \
         items point to the common experimental ground; metrics reported by several items are \
         the most direct basis for comparing results.\n\n",
    );
    out.push_str(
        "## Gaps & Future Work\n\n\
         - Check whether results were measured on the same datasets and splits.\n\
         - Look for missing baselines, small samples or unreported variance.\n\
         - Note fields marked N/A; they need the original source to complete.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockGenerator;
    use crate::config::NormalizeConfig;
    use crate::types::{ArtifactSource, StructuredRecord};

    fn synthesizer(caps: Capabilities) -> SurveySynthesizer {
        let normalizer = Arc::new(ContentNormalizer::new(
            caps.clone(),
            NormalizeConfig::default(),
        ));
        SurveySynthesizer::new(caps, normalizer, SurveyConfig::default())
    }

    fn structured(title: &str, method: &str, dataset: &str, results: &str) -> Artifact {
        Artifact::structured(
            StructuredRecord::new("Classify images", method, dataset, results, "Works"),
            ArtifactSource::Textbox,
        )
        .with_title(title)
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(
            split_terms("CNN with dropout; SGD, Adam/augmentation and mixup using GPUs."),
            vec!["CNN", "dropout", "SGD", "Adam", "augmentation", "mixup", "GPUs"]
        );
        assert!(split_terms("N/A").is_empty());
        assert_eq!(split_terms("CNN; N/A"), vec!["CNN"]);
        assert_eq!(split_terms("n/a with ResNet"), vec!["ResNet"]);
        // Words containing a separator word stay intact.
        assert_eq!(split_terms("Randomized sandwich"), vec!["Randomized sandwich"]);
    }

    #[test]
    fn test_term_frequencies_skip_embedded_not_available() {
        let rows = term_frequencies(["CNN; N/A", "N/A/ImageNet", "cnn"], 8);
        assert_eq!(rows, vec![("CNN".to_string(), 2), ("ImageNet".to_string(), 1)]);
    }

    #[test]
    fn test_term_frequencies_ties_keep_first_seen() {
        let rows = term_frequencies(["cnn; rnn", "RNN, gan", "Gan; mlp"], 8);
        assert_eq!(
            rows,
            vec![
                ("rnn".to_string(), 2),
                ("gan".to_string(), 2),
                ("cnn".to_string(), 1),
                ("mlp".to_string(), 1),
            ]
        );
        assert_eq!(term_frequencies(["a; b; c"], 2).len(), 2);
    }

    #[test]
    fn test_metric_mentions() {
        let rows = metric_mentions(["Accuracy 92%, F1 0.8", "accuracy 90%, ROUGE-L 41", "nothing"]);
        assert_eq!(rows, vec![("Accuracy", 2), ("F1", 1), ("ROUGE", 1)]);
    }

    #[test]
    fn test_template_sections() {
        let items = vec![
            NormalizedItem {
                title: "Paper A".to_string(),
                fields: StructuredRecord::new("o", "CNN", "CIFAR-10", "Accuracy 92%", "c"),
            },
            NormalizedItem {
                title: "Paper B".to_string(),
                fields: StructuredRecord::new("o", "CNN; ViT", "ImageNet", "Accuracy 95%", "c"),
            },
        ];
        let md = template_survey("Survey", &items, 8);
        assert!(md.starts_with("# Survey"));
        assert!(md.contains("[1] Paper A\n[2] Paper B"));
        assert!(md.contains("| CNN | 2 |"));
        assert!(md.contains("| Accuracy | 2 |"));
        assert!(md.contains("### [2] Paper B"));
        assert!(md.contains("## Gaps & Future Work"));
    }

    #[tokio::test]
    async fn test_survey_requires_two_artifacts() {
        let err = synthesizer(Capabilities::none())
            .synthesize(&[structured("A", "m", "d", "r")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::StudyError::Extraction(ExtractionError::NotEnoughArtifacts { .. })
        ));
    }

    #[tokio::test]
    async fn test_template_fallback_without_generator() {
        let artifacts = vec![
            structured("A", "CNN", "CIFAR-10", "Accuracy 92%"),
            structured("B", "ViT", "ImageNet", "Accuracy 95%"),
        ];
        let doc = synthesizer(Capabilities::none())
            .synthesize(&artifacts)
            .await
            .unwrap();
        assert_eq!(doc.strategy, Strategy::Heuristic);
        assert_eq!(doc.sources, 2);
        assert!(doc.markdown.contains("[1] A"));

        let artifact = doc.into_artifact();
        assert_eq!(artifact.kind, ArtifactKind::Survey);
        assert_eq!(artifact.source, ArtifactSource::Compare);
    }

    #[tokio::test]
    async fn test_generative_survey_uses_material() {
        let generator = Arc::new(MockGenerator::with_response("# Survey\n\n## Introduction\n..."));
        let artifacts = vec![
            structured("A", "CNN", "CIFAR-10", "Accuracy 92%"),
            Artifact::raw("A raw note about transformers.", ArtifactSource::Page).with_title("B"),
        ];
        let doc = synthesizer(Capabilities::none().with_generator(generator.clone()))
            .synthesize(&artifacts)
            .await
            .unwrap();
        assert_eq!(doc.strategy, Strategy::Generative);
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("[1] A\nObjective: Classify images"));
        assert!(prompt.contains("[2] B\nText: A raw note about transformers."));
        assert!(prompt.contains("Gaps & Future Work"));
    }

    #[tokio::test]
    async fn test_empty_generation_falls_back() {
        let generator = Arc::new(MockGenerator::with_response("   "));
        let artifacts = vec![
            structured("A", "CNN", "CIFAR-10", "Accuracy 92%"),
            structured("B", "ViT", "ImageNet", "Accuracy 95%"),
        ];
        let doc = synthesizer(Capabilities::none().with_generator(generator))
            .synthesize(&artifacts)
            .await
            .unwrap();
        assert_eq!(doc.strategy, Strategy::Heuristic);
    }
}
