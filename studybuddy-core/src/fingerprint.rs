//! Content fingerprints used to deduplicate saved artifacts.
//!
//! `sha256(kind + "|" + canonical)` where the canonical form is the trimmed
//! text for raw and survey artifacts and the fixed-key-order JSON of the
//! record for structured ones.

use sha2::{Digest, Sha256};

use crate::types::{Artifact, ArtifactKind, StructuredRecord};

/// Canonical content string of an artifact.
pub fn canonical_content(artifact: &Artifact) -> String {
    match artifact.kind {
        ArtifactKind::Structured => {
            let fields = artifact.fields.clone().unwrap_or_default();
            canonical_record(&fields)
        }
        ArtifactKind::Raw | ArtifactKind::Survey => artifact
            .text
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Deterministic JSON for a record. Struct serialization follows declaration
/// order, so the keys always come out as Objective, Method, Dataset, Results, Conclusion.
pub fn canonical_record(record: &StructuredRecord) -> String {
    serde_json::to_string(record).unwrap_or_default()
}

/// Fingerprint of an artifact's kind and content.
pub fn artifact_fingerprint(artifact: &Artifact) -> String {
    fingerprint(artifact.kind, &canonical_content(artifact))
}

/// Fingerprint of a kind/canonical-content pair.
pub fn fingerprint(kind: ArtifactKind, canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
