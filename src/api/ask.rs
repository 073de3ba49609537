//! The `/ask` and `/ask/stream` handlers. Both run the same orchestrator:
//! the synchronous path aggregates the event stream, so the two endpoints
//! cannot diverge on answers or sources.

use std::convert::Infallible;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::{Stream, StreamExt};

use crate::models::{AskRequest, AskResponse};
use crate::qa::events::QaEvent;
use crate::qa::orchestrator::answer_stream;
use crate::state::AppState;

fn validate_question(text: &str) -> Result<String, (StatusCode, String)> {
    let question = text.trim().to_string();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "malformed_request: question must not be empty".to_string(),
        ));
    }
    Ok(question)
}

/// POST /ask — answer synchronously by draining the event stream.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    let question = validate_question(&req.text)?;
    let started = Instant::now();

    let (session_id, events) = answer_stream(state, question.clone());
    futures_util::pin_mut!(events);

    let mut result = String::new();
    let mut sources = Vec::new();

    while let Some(event) = events.next().await {
        match event {
            QaEvent::Token { content } => result.push_str(&content),
            QaEvent::Sources { sources: s } => sources = s,
            QaEvent::Error { message, category } => {
                return Err((
                    category.status_code(),
                    format!("{}: {message}", category.as_str()),
                ));
            }
            _ => {}
        }
    }

    Ok(Json(AskResponse {
        question,
        result,
        sources,
        process_time: started.elapsed().as_secs_f64(),
        session_id,
    }))
}

/// POST /ask/stream — relay orchestrator events as SSE frames.
pub async fn ask_stream(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let question = validate_question(&req.text)?;

    let (_session_id, events) = answer_stream(state, question);
    let sse_stream = events.map(|event| {
        Ok(Event::default()
            .event(event.name())
            .json_data(event.payload())
            .unwrap())
    });

    Ok(Sse::new(sse_stream))
}
