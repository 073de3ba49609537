//! Cross-encoder scoring for retrieval candidates, via an OpenAI-compatible
//! rerank endpoint (llama-server or TEI running a bge-reranker model). All
//! (question, candidate) pairs go out in one batch request; verdicts come
//! back as per-index logits that are mapped onto the candidates.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::cmp::Ordering;
use std::time::Duration;

use crate::config::Config;
use crate::models::Candidate;

/// The sidecar answers in tens of milliseconds when healthy; anything slower
/// should degrade to fused scores rather than stall the question.
const RERANK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RerankVerdicts {
    results: Vec<RerankVerdict>,
}

/// One scored pair from the endpoint: which document, and how relevant.
#[derive(Debug, Deserialize)]
struct RerankVerdict {
    index: usize,
    relevance_score: f32,
}

/// Re-score candidates against the question with the configured
/// cross-encoder. Returns the surviving candidates reordered best-first and
/// truncated to `reranker_top_n`, each carrying its normalized relevance as
/// the new score. Errors (missing config, unreachable sidecar, bad payload)
/// are for the caller to degrade from.
pub async fn score_candidates(
    client: &reqwest::Client,
    config: &Config,
    question: &str,
    candidates: &[Candidate],
) -> Result<Vec<Candidate>> {
    let base_url = config
        .reranker_url
        .as_deref()
        .context("reranker URL not configured")?;
    let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

    let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
    let resp = client
        .post(&url)
        .timeout(RERANK_TIMEOUT)
        .json(&json!({
            "model": config.reranker_model,
            "query": question,
            "documents": texts,
            "top_n": config.reranker_top_n,
        }))
        .send()
        .await
        .context("failed to reach reranker endpoint")?;

    anyhow::ensure!(
        resp.status().is_success(),
        "reranker returned {}",
        resp.status()
    );

    let verdicts: RerankVerdicts = resp
        .json()
        .await
        .context("failed to parse reranker response")?;

    Ok(apply_verdicts(
        candidates,
        verdicts.results,
        config.reranker_top_n,
    ))
}

/// Map verdicts back onto the candidate list. The endpoint may answer with
/// fewer results than documents, in any order, and (from a misbehaving
/// sidecar) with out-of-range indices, which are dropped. Equal relevance
/// orders by chunk ID so the ranking is stable across runs.
fn apply_verdicts(
    candidates: &[Candidate],
    verdicts: Vec<RerankVerdict>,
    top_n: usize,
) -> Vec<Candidate> {
    let mut scored: Vec<Candidate> = verdicts
        .into_iter()
        .filter_map(|verdict| {
            candidates.get(verdict.index).map(|candidate| {
                let mut candidate = candidate.clone();
                candidate.score = sigmoid(verdict.relevance_score);
                candidate
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_n);
    scored
}

/// Squash a raw relevance logit into (0, 1), using the tanh identity.
fn sigmoid(x: f32) -> f32 {
    0.5 * (1.0 + (0.5 * x).tanh())
}
