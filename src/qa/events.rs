//! Progress events emitted over one question session. Within a session the
//! order is fixed: `start`, `phase(retrieve)`, optional `phase(rerank)`,
//! `retrieval_info`, `context_info`, `phase(generate)`, `ttft`, `token`*,
//! `sources`, `done` — with `error` terminal at any point.

use serde_json::{json, Value};

use crate::error::ErrorCategory;
use crate::models::ScoredSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Retrieve,
    Rerank,
    Generate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Retrieve => "retrieve",
            Phase::Rerank => "rerank",
            Phase::Generate => "generate",
        }
    }
}

#[derive(Debug, Clone)]
pub enum QaEvent {
    Start {
        session_id: String,
    },
    Phase {
        phase: Phase,
        message: String,
    },
    RetrievalInfo {
        total_found: usize,
        after_filter: usize,
    },
    ContextInfo {
        num_docs: usize,
        total_chars: usize,
    },
    Ttft {
        seconds: f64,
    },
    Token {
        content: String,
    },
    Sources {
        sources: Vec<ScoredSource>,
    },
    Done,
    Error {
        message: String,
        category: ErrorCategory,
    },
}

impl QaEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            QaEvent::Start { .. } => "start",
            QaEvent::Phase { .. } => "phase",
            QaEvent::RetrievalInfo { .. } => "retrieval_info",
            QaEvent::ContextInfo { .. } => "context_info",
            QaEvent::Ttft { .. } => "ttft",
            QaEvent::Token { .. } => "token",
            QaEvent::Sources { .. } => "sources",
            QaEvent::Done => "done",
            QaEvent::Error { .. } => "error",
        }
    }

    /// SSE data payload.
    pub fn payload(&self) -> Value {
        match self {
            QaEvent::Start { session_id } => json!({ "session_id": session_id }),
            QaEvent::Phase { phase, message } => {
                json!({ "phase": phase.as_str(), "message": message })
            }
            QaEvent::RetrievalInfo {
                total_found,
                after_filter,
            } => json!({ "total_found": total_found, "after_filter": after_filter }),
            QaEvent::ContextInfo {
                num_docs,
                total_chars,
            } => json!({ "num_docs": num_docs, "total_chars": total_chars }),
            QaEvent::Ttft { seconds } => json!({ "seconds": seconds }),
            QaEvent::Token { content } => json!({ "content": content }),
            QaEvent::Sources { sources } => json!({ "sources": sources }),
            QaEvent::Done => json!({}),
            QaEvent::Error { message, category } => {
                json!({ "message": message, "category": category })
            }
        }
    }

    /// Terminal events end the session; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QaEvent::Done | QaEvent::Error { .. })
    }
}
