//! Workbench: one method per user action, wiring pipelines to the store.
//!
//! Every action is all-or-nothing. A failure is returned as an error and the
//! saved artifacts are left as they were.

use crate::capability::{Availability, Capabilities};
use crate::compare::{Comparison, ComparisonEngine};
use crate::config::StudyConfig;
use crate::error::{ExtractionError, Result};
use crate::extraction::ExtractionPipeline;
use crate::normalizer::ContentNormalizer;
use crate::page::{PageText, PageTextSource, PdfTextSource};
use crate::persistence::FileKvStore;
use crate::providers::capabilities_from_config;
use crate::store::ArtifactStore;
use crate::survey::{SurveyDocument, SurveySynthesizer};
use crate::types::{Artifact, ArtifactSource};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Input text plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub source: ArtifactSource,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl SourceText {
    pub fn new(text: impl Into<String>, source: ArtifactSource) -> Self {
        Self {
            text: text.into(),
            source,
            title: None,
            url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn attach(&self, mut artifact: Artifact) -> Artifact {
        artifact.title = self.title.clone();
        artifact.url = self.url.clone();
        artifact
    }
}

impl From<PageText> for SourceText {
    fn from(page: PageText) -> Self {
        Self {
            text: page.text,
            source: page.source,
            title: page.title,
            url: page.url,
        }
    }
}

/// Survey output plus the id it was saved under, if saved.
#[derive(Debug, Clone)]
pub struct SurveyOutcome {
    pub document: SurveyDocument,
    pub saved_id: Option<String>,
}

/// The service user actions are dispatched to.
pub struct Workbench {
    store: Arc<ArtifactStore>,
    capabilities: Capabilities,
    pipeline: ExtractionPipeline,
    comparison: ComparisonEngine,
    survey: SurveySynthesizer,
}

impl Workbench {
    pub fn new(store: Arc<ArtifactStore>, capabilities: Capabilities, config: &StudyConfig) -> Self {
        let normalizer = Arc::new(ContentNormalizer::new(
            capabilities.clone(),
            config.normalize.clone(),
        ));
        Self {
            pipeline: ExtractionPipeline::new(
                capabilities.clone(),
                normalizer.clone(),
                config.extraction.clone(),
            ),
            comparison: ComparisonEngine::new(capabilities.clone(), normalizer.clone()),
            survey: SurveySynthesizer::new(capabilities.clone(), normalizer, config.survey.clone()),
            store,
            capabilities,
        }
    }

    /// File-backed store in the configured data dir plus the configured model.
    pub fn from_config(config: &StudyConfig) -> Result<Self> {
        config.validate()?;
        let dir = config.store.resolved_data_dir();
        let store = Arc::new(ArtifactStore::new(
            Arc::new(FileKvStore::new(dir)),
            config.store.max_entries,
        ));
        let capabilities = capabilities_from_config(&config.model)?;
        Ok(Self::new(store, capabilities, config))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Summarize and save. Returns the saved artifact.
    pub async fn summarize(&self, input: SourceText) -> Result<Artifact> {
        let summary = self.pipeline.summarize(&input.text).await?;
        self.save(input.attach(Artifact::raw(summary, input.source)))
            .await
    }

    /// Structure into the five fields and save. Returns the saved artifact.
    pub async fn structure(&self, input: SourceText) -> Result<Artifact> {
        let (record, _) = self.pipeline.structure(&input.text).await?;
        self.save(input.attach(Artifact::structured(record, input.source)))
            .await
    }

    /// Compare the selected saved artifacts.
    pub async fn compare(&self, ids: &[String]) -> Result<Comparison> {
        let artifacts = self.selected(ids).await?;
        self.comparison.compare(&artifacts).await
    }

    /// Synthesize a survey over the selected artifacts, optionally saving it.
    pub async fn generate_survey(&self, ids: &[String], save: bool) -> Result<SurveyOutcome> {
        let artifacts = self.selected(ids).await?;
        let document = self.survey.synthesize(&artifacts).await?;
        let saved_id = if save {
            Some(self.save(document.clone().into_artifact()).await?.id)
        } else {
            None
        };
        Ok(SurveyOutcome { document, saved_id })
    }

    /// Saved artifacts, newest first.
    pub async fn saved(&self) -> Result<Vec<Artifact>> {
        self.store.list().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Query the summarizer and persist whether it is ready.
    pub async fn check_readiness(&self) -> Result<Availability> {
        let availability = match &self.capabilities.summarizer {
            Some(summarizer) => summarizer.availability().await,
            None => Availability::Unavailable,
        };
        self.store
            .set_ready(availability == Availability::Ready)
            .await?;
        info!(availability = %availability, "Checked model readiness");
        Ok(availability)
    }

    /// Summarize the text of a tab and save it.
    pub async fn summarize_page(&self, source: &dyn PageTextSource, tab: &str) -> Result<Artifact> {
        let page = source.page_text(tab).await?;
        self.summarize(page.into()).await
    }

    /// Summarize the text of a PDF file and save it.
    pub async fn summarize_pdf(&self, source: &dyn PdfTextSource, file: &Path) -> Result<Artifact> {
        let text = source.pdf_text(file).await?;
        let mut input = SourceText::new(text, ArtifactSource::Pdf);
        if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
            input = input.with_title(name);
        }
        self.summarize(input).await
    }

    async fn save(&self, mut artifact: Artifact) -> Result<Artifact> {
        artifact.hash = artifact.content_hash();
        self.store.save(artifact.clone()).await?;
        Ok(artifact)
    }

    /// Artifacts for `ids` in store order. Every id must exist.
    async fn selected(&self, ids: &[String]) -> Result<Vec<Artifact>> {
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        let found = self.store.get_many(&wanted).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|a| &a.id == *id)) {
            return Err(ExtractionError::UnknownArtifact {
                id: missing.clone(),
            }
            .into());
        }
        Ok(found)
    }
}
