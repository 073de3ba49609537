use serde::{Deserialize, Serialize};
use std::path::Path;

/// A bounded slice of a source note: the unit of indexing, retrieval, and
/// context. Immutable once created; replaced wholesale when its source file
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic identifier, stable across reindexes of identical content.
    pub id: String,
    /// Source path relative to the vault root, with forward slashes.
    pub source: String,
    /// 0-based ordinal within the source file.
    pub position: usize,
    pub text: String,
    /// Outbound wiki-link targets extracted from the chunk text.
    pub links: Vec<String>,
}

/// Which retriever produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Lexical,
    Vector,
    Linked,
}

impl Provenance {
    /// Wire name used in the `sources` list.
    pub fn retrieval_type(&self) -> &'static str {
        match self {
            Provenance::Linked => "linked",
            _ => "retrieved",
        }
    }
}

/// A transient retrieval candidate flowing through fusion → rerank →
/// expansion. Exists only within a single question's lifecycle.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    /// Max-normalized BM25 score, 0.0 when the lexical side did not match.
    pub bm25_score: f32,
    /// Max-normalized cosine score, 0.0 when the vector side did not match.
    pub vector_score: f32,
    /// Current ranking score in [0, 1]: fused, then reranked if enabled.
    pub score: f32,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn to_scored_source(&self) -> ScoredSource {
        ScoredSource {
            source: self.source.clone(),
            name: display_name(&self.source),
            score: self.score.clamp(0.0, 1.0),
            retrieval_type: self.provenance.retrieval_type().to_string(),
        }
    }
}

/// The per-source record returned to clients alongside the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSource {
    pub source: String,
    pub name: String,
    pub score: f32,
    pub retrieval_type: String,
}

/// Display name for a note path: the file stem without folders or extension.
pub fn display_name(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub result: String,
    pub sources: Vec<ScoredSource>,
    pub process_time: f64,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_notes: usize,
    pub total_chunks: usize,
    pub total_words: usize,
    pub total_chars: usize,
    pub avg_words_per_chunk: usize,
    pub folders: usize,
    pub internal_links: usize,
    pub vault_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildResponse {
    pub status: String,
    pub total_chunks: usize,
}
