//! Page and PDF text sources.

use crate::error::CapabilityError;
use crate::text::{char_len, clamp_chars};
use crate::types::ArtifactSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `main`/`article` text is preferred only when longer than this.
pub const MAIN_MIN_CHARS: usize = 200;
/// Body text is capped at this many characters.
pub const BODY_MAX_CHARS: usize = 20_000;

/// Raw text captured from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Current user selection, if any.
    #[serde(default)]
    pub selection: Option<String>,
    /// Text of the page's `main` or `article` element.
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Text chosen from a page plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub text: String,
    /// `Selection` or `Page`.
    pub source: ArtifactSource,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl PageSnapshot {
    /// Pick the text to work on: a non-blank selection, else `main` when long
    /// enough, else the body capped at `BODY_MAX_CHARS`.
    pub fn extract(&self) -> PageText {
        let (text, source) = if let Some(selection) = self.selection.as_deref()
            && !selection.trim().is_empty()
        {
            (selection.trim().to_string(), ArtifactSource::Selection)
        } else if let Some(main) = self.main.as_deref()
            && char_len(main.trim()) > MAIN_MIN_CHARS
        {
            (main.trim().to_string(), ArtifactSource::Page)
        } else {
            (
                clamp_chars(self.body.trim(), BODY_MAX_CHARS),
                ArtifactSource::Page,
            )
        };
        PageText {
            text,
            source,
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// Host capability returning the text of a tab.
#[async_trait]
pub trait PageTextSource: Send + Sync {
    async fn page_text(&self, tab: &str) -> Result<PageText, CapabilityError>;
}

/// Host capability extracting plain text from a PDF file.
#[async_trait]
pub trait PdfTextSource: Send + Sync {
    async fn pdf_text(&self, file: &Path) -> Result<String, CapabilityError>;
}

/// A page source backed by a fixed snapshot, whatever the tab.
#[derive(Debug, Clone)]
pub struct SnapshotPageSource {
    snapshot: PageSnapshot,
}

impl SnapshotPageSource {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl PageTextSource for SnapshotPageSource {
    async fn page_text(&self, _tab: &str) -> Result<PageText, CapabilityError> {
        Ok(self.snapshot.extract())
    }
}
