//! Core data model: saved artifacts and the five-field record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint;

/// Placeholder for a field with no known value.
pub const NOT_AVAILABLE: &str = "N/A";

/// The five record fields, in canonical order.
pub const FIELD_NAMES: [&str; 5] = ["Objective", "Method", "Dataset", "Results", "Conclusion"];

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Free-text summary.
    Raw,
    /// Five-field record.
    Structured,
    /// Synthesized literature survey.
    Survey,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Raw => "raw",
            ArtifactKind::Structured => "structured",
            ArtifactKind::Survey => "survey",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the artifact's input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    Pdf,
    Textbox,
    Selection,
    Page,
    Compare,
}

impl ArtifactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactSource::Pdf => "pdf",
            ArtifactSource::Textbox => "textbox",
            ArtifactSource::Selection => "selection",
            ArtifactSource::Page => "page",
            ArtifactSource::Compare => "compare",
        }
    }
}

impl std::fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ArtifactSource::Pdf),
            "textbox" | "text" => Ok(ArtifactSource::Textbox),
            "selection" => Ok(ArtifactSource::Selection),
            "page" => Ok(ArtifactSource::Page),
            "compare" => Ok(ArtifactSource::Compare),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// The Objective/Method/Dataset/Results/Conclusion record.
///
/// Serialized with the capitalized field names; the declaration order is the
/// canonical key order used for fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    #[serde(rename = "Objective", default = "not_available")]
    pub objective: String,
    #[serde(rename = "Method", default = "not_available")]
    pub method: String,
    #[serde(rename = "Dataset", default = "not_available")]
    pub dataset: String,
    #[serde(rename = "Results", default = "not_available")]
    pub results: String,
    #[serde(rename = "Conclusion", default = "not_available")]
    pub conclusion: String,
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

impl Default for StructuredRecord {
    fn default() -> Self {
        Self {
            objective: not_available(),
            method: not_available(),
            dataset: not_available(),
            results: not_available(),
            conclusion: not_available(),
        }
    }
}

impl StructuredRecord {
    pub fn new(
        objective: impl Into<String>,
        method: impl Into<String>,
        dataset: impl Into<String>,
        results: impl Into<String>,
        conclusion: impl Into<String>,
    ) -> Self {
        Self {
            objective: objective.into(),
            method: method.into(),
            dataset: dataset.into(),
            results: results.into(),
            conclusion: conclusion.into(),
        }
    }

    /// Field name/value pairs in canonical order.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            (FIELD_NAMES[0], self.objective.as_str()),
            (FIELD_NAMES[1], self.method.as_str()),
            (FIELD_NAMES[2], self.dataset.as_str()),
            (FIELD_NAMES[3], self.results.as_str()),
            (FIELD_NAMES[4], self.conclusion.as_str()),
        ]
    }

    /// Apply `f` to every field.
    pub fn map_fields(&self, mut f: impl FnMut(&str) -> String) -> Self {
        Self {
            objective: f(&self.objective),
            method: f(&self.method),
            dataset: f(&self.dataset),
            results: f(&self.results),
            conclusion: f(&self.conclusion),
        }
    }

    /// All five fields joined with single spaces.
    pub fn joined(&self) -> String {
        self.entries()
            .iter()
            .map(|(_, v)| *v)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Markdown rendering: one bold label per field.
    pub fn to_markdown(&self) -> String {
        self.entries()
            .iter()
            .map(|(name, value)| format!("**{name}**: {value}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A saved unit of work product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub when: DateTime<Utc>,
    pub kind: ArtifactKind,
    pub source: ArtifactSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<StructuredRecord>,
    #[serde(default)]
    pub hash: String,
}

impl Artifact {
    fn new(kind: ArtifactKind, source: ArtifactSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            when: Utc::now(),
            kind,
            source,
            title: None,
            url: None,
            text: None,
            fields: None,
            hash: String::new(),
        }
    }

    /// A free-text summary artifact.
    pub fn raw(text: impl Into<String>, source: ArtifactSource) -> Self {
        let mut artifact = Self::new(ArtifactKind::Raw, source);
        artifact.text = Some(text.into());
        artifact
    }

    /// A five-field record artifact.
    pub fn structured(fields: StructuredRecord, source: ArtifactSource) -> Self {
        let mut artifact = Self::new(ArtifactKind::Structured, source);
        artifact.fields = Some(fields);
        artifact
    }

    /// A synthesized survey artifact.
    pub fn survey(text: impl Into<String>) -> Self {
        let mut artifact = Self::new(ArtifactKind::Survey, ArtifactSource::Compare);
        artifact.text = Some(text.into());
        artifact
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Content fingerprint over `kind` and the canonical content.
    pub fn content_hash(&self) -> String {
        fingerprint::artifact_fingerprint(self)
    }

    /// Display label: the title when present, otherwise the first words of the content.
    pub fn label(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim)
            && !title.is_empty()
        {
            return title.to_string();
        }
        let body = match (&self.text, &self.fields) {
            (Some(text), _) => text.trim().to_string(),
            (None, Some(fields)) => fields.objective.clone(),
            (None, None) => String::new(),
        };
        let collapsed = crate::text::collapse_whitespace(&body);
        if collapsed.is_empty() {
            format!("Untitled {}", self.kind)
        } else {
            crate::text::clamp_chars(&collapsed, 60)
        }
    }
}
