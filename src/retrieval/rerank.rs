//! Rerank stage: cross-encoder re-scoring of fused candidates, followed by
//! the minimum-score threshold that bounds context volume.

use crate::llm::cross_encoder;
use crate::models::Candidate;
use crate::state::AppState;

/// Re-score candidates with the cross-encoder sidecar and keep the top N.
/// Any sidecar failure degrades to the fused ordering with a warning; a
/// question is never failed by the reranker.
pub async fn apply_cross_encoder(
    state: &AppState,
    question: &str,
    candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    if state.config.reranker_url.is_none() {
        tracing::warn!("reranker enabled but no reranker URL configured; using fused scores");
        return candidates;
    }

    match cross_encoder::score_candidates(&state.http_client, &state.config, question, &candidates)
        .await
    {
        Ok(scored) if !scored.is_empty() => scored,
        Ok(_) => {
            tracing::warn!("reranker returned no usable results; using fused scores");
            candidates
        }
        Err(e) => {
            tracing::warn!("reranking failed, falling back to fused scores: {e:#}");
            candidates
        }
    }
}

/// Drop candidates scoring below `min_score`. If that would leave nothing,
/// the single highest-scored candidate survives so the generator always has
/// the best available context.
pub fn apply_min_score(candidates: Vec<Candidate>, min_score: f32) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let kept: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.score >= min_score)
        .cloned()
        .collect();

    if !kept.is_empty() {
        return kept;
    }

    let mut sorted = candidates;
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    sorted.truncate(1);
    sorted
}
