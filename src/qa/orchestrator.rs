//! The question-answering orchestrator: a two-stage state machine
//! (retrieve → generate) that produces a lazy event sequence. Events flow
//! through a small bounded channel, so a stalled client eventually blocks
//! the producer and, through it, the upstream generator read. Dropping the
//! stream cancels the session task and aborts any in-flight upstream call.

use futures_util::stream::{self, Stream, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ErrorCategory;
use crate::llm::generate::stream_generate;
use crate::models::{Candidate, ScoredSource};
use crate::qa::events::{Phase, QaEvent};
use crate::retrieval::graph::expand_links;
use crate::retrieval::hybrid::hybrid_search;
use crate::retrieval::rerank::{apply_cross_encoder, apply_min_score};
use crate::state::AppState;

/// Bounded so a stalled client exerts backpressure instead of growing an
/// internal queue.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// A generator that stops producing tokens for this long aborts the session.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

const GENERATION_TEMPERATURE: f32 = 0.1;

/// Start a question session. Returns the session ID and the event stream;
/// the session runs only as fast as the returned stream is consumed.
pub fn answer_stream(
    state: AppState,
    question: String,
) -> (String, impl Stream<Item = QaEvent> + Send) {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let sid = session_id.clone();
    tokio::spawn(async move {
        let started = Instant::now();
        run_session(state, question, sid, started, tx).await;
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    });

    (session_id, events)
}

/// Drive one session through both stages. Every emission checks for a gone
/// client; returning early drops the upstream token stream, which cancels
/// the generation call.
async fn run_session(
    state: AppState,
    question: String,
    session_id: String,
    started: Instant,
    tx: mpsc::Sender<QaEvent>,
) {
    let emit = |event: QaEvent| {
        let tx = tx.clone();
        async move { tx.send(event).await.is_ok() }
    };

    if !emit(QaEvent::Start { session_id }).await {
        return;
    }

    // ── Stage 1: retrieve ─────────────────────────────────
    if !emit(QaEvent::Phase {
        phase: Phase::Retrieve,
        message: "Searching your notes".to_string(),
    })
    .await
    {
        return;
    }

    let candidates = match hybrid_search(&state, &question).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::error!("retrieval failed: {e}");
            let _ = emit(QaEvent::Error {
                message: e.message,
                category: e.category,
            })
            .await;
            return;
        }
    };
    let total_found = candidates.len();

    let candidates = if state.config.use_reranker && !candidates.is_empty() {
        if !emit(QaEvent::Phase {
            phase: Phase::Rerank,
            message: "Reranking results".to_string(),
        })
        .await
        {
            return;
        }
        apply_cross_encoder(&state, &question, candidates).await
    } else {
        candidates
    };

    let candidates = apply_min_score(candidates, state.config.min_score);
    let after_filter = candidates.len();

    if !emit(QaEvent::RetrievalInfo {
        total_found,
        after_filter,
    })
    .await
    {
        return;
    }

    let known_sources = state.manifest.read().sources();
    let candidates = expand_links(&state.config.vault_path, &known_sources, &candidates).await;

    let context = build_context(&candidates);
    if !emit(QaEvent::ContextInfo {
        num_docs: candidates.len(),
        total_chars: context.len(),
    })
    .await
    {
        return;
    }

    // ── Stage 2: generate ─────────────────────────────────
    if !emit(QaEvent::Phase {
        phase: Phase::Generate,
        message: format!("Generating answer with {}", state.config.llm_model),
    })
    .await
    {
        return;
    }

    let prompt = build_prompt(&context, &question);
    let mut tokens = match stream_generate(
        &state.http_client,
        &state.config.ollama_base_url,
        &state.config.llm_model,
        &prompt,
        GENERATION_TEMPERATURE,
    )
    .await
    {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("generation failed to start: {e}");
            let _ = emit(QaEvent::Error {
                message: e.message,
                category: e.category,
            })
            .await;
            return;
        }
    };

    let mut first_token = true;
    loop {
        match tokio::time::timeout(IDLE_TIMEOUT, tokens.next()).await {
            Ok(Some(Ok(content))) => {
                if first_token {
                    first_token = false;
                    if !emit(QaEvent::Ttft {
                        seconds: started.elapsed().as_secs_f64(),
                    })
                    .await
                    {
                        return;
                    }
                }
                if !emit(QaEvent::Token { content }).await {
                    return;
                }
            }
            Ok(Some(Err(e))) => {
                // Partial output already delivered stays with the client.
                let _ = emit(QaEvent::Error {
                    message: e.message,
                    category: e.category,
                })
                .await;
                return;
            }
            Ok(None) => break,
            Err(_) => {
                let _ = emit(QaEvent::Error {
                    message: format!(
                        "model produced no output for {}s",
                        IDLE_TIMEOUT.as_secs()
                    ),
                    category: ErrorCategory::GenerationStreamBroken,
                })
                .await;
                return;
            }
        }
    }

    let sources = scored_sources(&candidates);
    if !emit(QaEvent::Sources { sources }).await {
        return;
    }
    let _ = emit(QaEvent::Done).await;
}

/// Render candidates into the context block handed to the generator.
pub fn build_context(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("--- From: {} ---\n{}", c.source, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The fixed prompt template: two slots, context and question.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an assistant that answers questions using ONLY the provided notes.\n\
         \n\
         Rules:\n\
         1. When asked for specific wording, quote it exactly as written.\n\
         2. If the context is insufficient, answer \"I could not find this in your notes\".\n\
         3. Answer in Markdown, directly and concisely.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}

/// Final per-source list for the client, best first, deterministic on ties.
pub fn scored_sources(candidates: &[Candidate]) -> Vec<ScoredSource> {
    let mut sources: Vec<ScoredSource> =
        candidates.iter().map(Candidate::to_scored_source).collect();
    sources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.cmp(&b.source))
    });
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn candidate(source: &str, text: &str, score: f32, provenance: Provenance) -> Candidate {
        Candidate {
            chunk_id: format!("id-{source}-{score}"),
            source: source.to_string(),
            text: text.to_string(),
            bm25_score: 0.0,
            vector_score: 0.0,
            score,
            provenance,
        }
    }

    #[test]
    fn test_build_context_format() {
        let context = build_context(&[
            candidate("a.md", "alpha text", 0.9, Provenance::Vector),
            candidate("sub/b.md", "beta text", 0.5, Provenance::Lexical),
        ]);
        assert_eq!(
            context,
            "--- From: a.md ---\nalpha text\n\n--- From: sub/b.md ---\nbeta text"
        );
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_prompt_contains_both_slots() {
        let prompt = build_prompt("the context block", "the question?");
        assert!(prompt.contains("the context block"));
        assert!(prompt.contains("Question: the question?"));
        assert!(prompt.contains("I could not find this in your notes"));
    }

    #[test]
    fn test_scored_sources_sorted_desc() {
        let sources = scored_sources(&[
            candidate("low.md", "x", 0.2, Provenance::Linked),
            candidate("high.md", "x", 0.9, Provenance::Vector),
            candidate("mid.md", "x", 0.5, Provenance::Lexical),
        ]);
        let names: Vec<&str> = sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(names, vec!["high.md", "mid.md", "low.md"]);
        assert_eq!(sources[2].retrieval_type, "linked");
        assert_eq!(sources[0].retrieval_type, "retrieved");
    }

    #[test]
    fn test_scored_sources_tie_breaks_by_source() {
        let sources = scored_sources(&[
            candidate("z.md", "x", 0.5, Provenance::Vector),
            candidate("a.md", "x", 0.5, Provenance::Vector),
        ]);
        assert_eq!(sources[0].source, "a.md");
    }
}
