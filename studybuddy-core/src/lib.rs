//! # StudyBuddy Core
//!
//! Core library for the StudyBuddy research-note workbench.
//! Provides the artifact store, the five-field normalizer, the extraction
//! pipeline, comparison and survey synthesis, model capabilities,
//! configuration, and fundamental types.

pub mod capability;
pub mod compare;
pub mod config;
pub mod error;
pub mod extraction;
pub mod fingerprint;
pub mod normalizer;
pub mod page;
pub mod persistence;
pub mod providers;
pub mod store;
pub mod survey;
pub mod text;
pub mod types;
pub mod workbench;

// Re-export commonly used types at the crate root.
pub use capability::{
    Availability, Capabilities, GenerateOptions, MockGenerator, MockSummarization,
    SummarizationCapability, Summarizer, SummarizerConfig, TextGenerator,
};
pub use compare::{Comparison, ComparisonEngine};
pub use config::{StudyConfig, load_config};
pub use error::{Result, StudyError};
pub use extraction::{ExtractMode, Extraction, ExtractionPipeline};
pub use normalizer::{ContentNormalizer, NormalizedItem, Strategy};
pub use page::{PageSnapshot, PageText, PageTextSource, PdfTextSource, SnapshotPageSource};
pub use persistence::{FileKvStore, InMemoryKvStore, KeyValueStore};
pub use providers::OllamaClient;
pub use store::ArtifactStore;
pub use survey::{SurveyDocument, SurveySynthesizer};
pub use types::{Artifact, ArtifactKind, ArtifactSource, StructuredRecord};
pub use workbench::{SourceText, SurveyOutcome, Workbench};
