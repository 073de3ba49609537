//! Hybrid retrieval: the question is embedded once, lexical and vector
//! queries run concurrently, and their max-normalized scores are fused with
//! configurable weights.

use std::collections::HashMap;

use crate::error::{ErrorCategory, QaError};
use crate::models::{Candidate, Provenance};
use crate::state::AppState;
use crate::store::lexical::LexicalHit;
use crate::store::vector::VectorHit;

/// Run the hybrid query and return a fused, deduplicated, deterministically
/// ordered candidate list.
pub async fn hybrid_search(state: &AppState, question: &str) -> Result<Vec<Candidate>, QaError> {
    let embedding = state.embedder.embed_query(question).await.map_err(|e| {
        QaError::new(
            ErrorCategory::EmbedderUnavailable,
            format!("cannot embed question: {e}"),
        )
    })?;

    // BM25 is CPU-bound tantivy work; run it off the async threads while the
    // vector scan proceeds here.
    let lexical = state.lexical.clone();
    let query = question.to_string();
    let bm25_k = state.config.bm25_k;
    let bm25_task = tokio::task::spawn_blocking(move || lexical.search(&query, bm25_k));

    let vector_hits = state.vectors.query(&embedding, state.config.retrieval_k);

    let bm25_hits = match bm25_task.await {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => {
            tracing::warn!("BM25 search failed, falling back to vector-only: {e:#}");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("BM25 search task failed: {e}");
            Vec::new()
        }
    };

    Ok(fuse(
        &bm25_hits,
        &vector_hits,
        state.config.vector_weight,
        state.config.bm25_weight,
    ))
}

/// Fuse the two ranked lists. Each side is normalized by its own maximum
/// score; a candidate present in only one list gets 0 from the missing side.
/// Ties order by vector score, then chunk ID, so the ranking is stable
/// across runs.
pub fn fuse(
    bm25_hits: &[LexicalHit],
    vector_hits: &[VectorHit],
    vector_weight: f32,
    bm25_weight: f32,
) -> Vec<Candidate> {
    let bm25_max = bm25_hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
    let vector_max = vector_hits.iter().map(|h| h.score).fold(0.0f32, f32::max);

    let mut by_id: HashMap<String, Candidate> = HashMap::new();

    for hit in bm25_hits {
        let normalized = if bm25_max > 0.0 {
            (hit.score / bm25_max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let entry = by_id
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| blank_candidate(&hit.chunk_id, &hit.source, &hit.text));
        entry.bm25_score = entry.bm25_score.max(normalized);
    }

    for hit in vector_hits {
        let normalized = if vector_max > 0.0 {
            (hit.score / vector_max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let entry = by_id
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| blank_candidate(&hit.chunk_id, &hit.source, &hit.text));
        entry.vector_score = entry.vector_score.max(normalized);
    }

    let mut candidates: Vec<Candidate> = by_id
        .into_values()
        .map(|mut c| {
            c.score = vector_weight * c.vector_score + bm25_weight * c.bm25_score;
            c.provenance = if c.vector_score > 0.0 && c.vector_score >= c.bm25_score {
                Provenance::Vector
            } else {
                Provenance::Lexical
            };
            c
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.vector_score
                    .partial_cmp(&a.vector_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    candidates
}

fn blank_candidate(chunk_id: &str, source: &str, text: &str) -> Candidate {
    Candidate {
        chunk_id: chunk_id.to_string(),
        source: source.to_string(),
        text: text.to_string(),
        bm25_score: 0.0,
        vector_score: 0.0,
        score: 0.0,
        provenance: Provenance::Lexical,
    }
}
