//! Batch embedding via the Ollama `/api/embed` endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbedderError;

/// Maximum characters to send per text to the embedding API.
/// nomic-embed-text has an 8192-token context; prose tokenizes at roughly
/// 1 token per 3-4 chars, so 3000 chars stays safely inside it. `truncate:
/// true` is also passed, but Ollama has been known to 400 on over-long
/// inputs regardless.
const MAX_EMBED_CHARS: usize = 3_000;

const BATCH_SIZE: usize = 32;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400.
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, dimension: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            model,
            dimension,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let url = format!("{}/api/embed", self.base_url);
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t, MAX_EMBED_CHARS).to_string())
            .collect();

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in truncated.chunks(BATCH_SIZE) {
            let req = EmbedRequest {
                model: self.model.clone(),
                input: batch.to_vec(),
                truncate: true,
            };

            let resp = self
                .client
                .post(&url)
                .json(&req)
                .send()
                .await
                .map_err(|e| EmbedderError::RequestFailed(format!("cannot reach {url}: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(EmbedderError::RequestFailed(format!(
                    "embed API returned {status}: {body}"
                )));
            }

            let body: EmbedResponse = resp
                .json()
                .await
                .map_err(|e| EmbedderError::RequestFailed(format!("bad embed response: {e}")))?;

            for embedding in &body.embeddings {
                if embedding.len() != self.dimension {
                    return Err(EmbedderError::RequestFailed(format!(
                        "model returned dimension {}, expected {}",
                        embedding.len(),
                        self.dimension
                    )));
                }
            }

            all_embeddings.extend(body.embeddings);
        }

        Ok(all_embeddings)
    }
}

/// Truncate `text` to at most `max_chars` bytes, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
