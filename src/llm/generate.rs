//! Token streaming from the Ollama `/api/generate` endpoint and the model
//! catalog at `/api/tags`.

use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::error::{ErrorCategory, QaError};

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, QaError>> + Send>>;

/// Overrides the shared client's 120 s default: a generation stream has no
/// total limit, only the caller's idle-between-tokens timeout.
const STREAM_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Open a streaming generation call. Failures before the first byte map to
/// `llm_unavailable`; failures after the stream has begun surface as
/// `generation_stream_broken` items.
pub async fn stream_generate(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    prompt: &str,
    temperature: f32,
) -> Result<TokenStream, QaError> {
    let url = format!("{}/api/generate", base_url);

    let req = GenerateRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        stream: true,
        options: GenerateOptions { temperature },
    };

    let resp = client
        .post(&url)
        .timeout(STREAM_TIMEOUT)
        .json(&req)
        .send()
        .await
        .map_err(|e| {
        QaError::new(
            ErrorCategory::LlmUnavailable,
            format!("cannot reach model host at {base_url}: {e}"),
        )
    })?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(QaError::new(
            ErrorCategory::LlmUnavailable,
            format!("model host returned {status}: {body}"),
        ));
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_generate_line(&line),
            Err(message) => Some(Err(QaError::new(
                ErrorCategory::GenerationStreamBroken,
                message,
            ))),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse one NDJSON line from the generate stream. Returns:
/// - `Some(Ok(fragment))` for content
/// - `Some(Err(..))` for malformed lines
/// - `None` to skip (empty fragment or the done marker)
fn parse_generate_line(line: &str) -> Option<Result<String, QaError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => {
            if chunk.done || chunk.response.is_empty() {
                return None;
            }
            Some(Ok(chunk.response))
        }
        Err(e) => Some(Err(QaError::new(
            ErrorCategory::GenerationStreamBroken,
            format!("malformed stream chunk: {e}"),
        ))),
    }
}

// ─── Model catalog ───────────────────────────────────────

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}

/// List model names available on the model host.
pub async fn list_models(
    client: &reqwest::Client,
    base_url: &str,
) -> anyhow::Result<Vec<String>> {
    let url = format!("{}/api/tags", base_url);
    let resp = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await?;

    anyhow::ensure!(
        resp.status().is_success(),
        "model host returned {}",
        resp.status()
    );

    let body: TagsResponse = resp.json().await?;
    Ok(body.models.into_iter().map(|m| m.name).collect())
}

// ─── Line buffering ──────────────────────────────────────

/// Convert a byte stream into a stream of complete lines.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String, String>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].to_string();
                    buffer = buffer[newline_pos + 1..].to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(format!("stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        // Stream ended; flush any trailing partial line.
                        if !buffer.trim().is_empty() {
                            let remaining = std::mem::take(&mut buffer);
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
