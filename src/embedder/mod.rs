//! Embedding providers behind one interface: an Ollama HTTP endpoint, an
//! in-process ONNX encoder, and a deterministic mock for tests. HTTP calls
//! are retried with exponential backoff; in-process inference runs on the
//! blocking pool.

pub mod mock;
pub mod ollama;
pub mod onnx;
pub mod tokenizer;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;

const EMBED_ATTEMPTS: u32 = 3;
const EMBED_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Task type for asymmetric embedding models (e.g. nomic-embed-text, E5).
/// These models were trained with different prefixes for queries vs
/// documents, which improves the embedding geometry for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    /// Indexing: text being stored for later retrieval.
    SearchDocument,
    /// Querying: text used to search against stored documents.
    SearchQuery,
}

impl EmbedTask {
    /// The prefix string for the given embedding model. The trailing space
    /// after the colon is required by most models.
    pub fn prefix_for_model(&self, model_name: &str) -> &'static str {
        let lower = model_name.to_lowercase();
        if lower.contains("nomic") {
            match self {
                EmbedTask::SearchDocument => "search_document: ",
                EmbedTask::SearchQuery => "search_query: ",
            }
        } else if lower.contains("e5") {
            match self {
                EmbedTask::SearchDocument => "passage: ",
                EmbedTask::SearchQuery => "query: ",
            }
        } else {
            ""
        }
    }
}

/// An embedding provider selected at startup. All variants map a batch of
/// texts to vectors of one fixed dimension.
pub enum Embedder {
    Ollama(ollama::OllamaEmbedder),
    Onnx(Arc<onnx::OnnxEmbedder>),
    Mock(mock::MockEmbedder),
}

impl Embedder {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.embedder_provider.as_str() {
            "ollama" => Ok(Embedder::Ollama(ollama::OllamaEmbedder::new(
                config.ollama_base_url.clone(),
                config.embedder_model.clone(),
                config.embedding_dim,
            )?)),
            "onnx" => {
                let inner = onnx::OnnxEmbedder::new(&config.model_dir, config.embedding_dim)
                    .map_err(|e| anyhow::anyhow!("cannot initialize onnx embedder: {e}"))?;
                Ok(Embedder::Onnx(Arc::new(inner)))
            }
            other => anyhow::bail!("unknown embedder provider: {other}"),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Embedder::Ollama(e) => e.dimension(),
            Embedder::Onnx(e) => e.dimension(),
            Embedder::Mock(m) => m.dimension(),
        }
    }

    /// The model name used to pick task prefixes.
    fn model_name(&self) -> &str {
        match self {
            Embedder::Ollama(e) => e.model(),
            Embedder::Onnx(e) => e.model_name(),
            Embedder::Mock(_) => "",
        }
    }

    /// Embed a batch of texts. Provider calls dominate indexing cost, so
    /// callers batch whole files at a time. HTTP failures are retried up to
    /// 3 attempts with 1s/2s/4s backoff; persistent failure fails the batch
    /// without touching any store.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        task: EmbedTask,
    ) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefix = task.prefix_for_model(self.model_name());
        let prefixed: Vec<String> = if prefix.is_empty() {
            texts.to_vec()
        } else {
            texts.iter().map(|t| format!("{prefix}{t}")).collect()
        };

        match self {
            Embedder::Ollama(e) => {
                let mut backoff = EMBED_BACKOFF_BASE;
                let mut attempt = 1;
                loop {
                    match e.embed_batch(&prefixed).await {
                        Ok(vectors) => return Ok(vectors),
                        Err(err) if attempt < EMBED_ATTEMPTS => {
                            tracing::warn!(
                                "embedding attempt {attempt}/{EMBED_ATTEMPTS} failed, retrying in {backoff:?}: {err}"
                            );
                            tokio::time::sleep(backoff).await;
                            backoff *= 2;
                            attempt += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            Embedder::Onnx(e) => {
                let e = e.clone();
                tokio::task::spawn_blocking(move || e.embed_batch(&prefixed))
                    .await
                    .map_err(|e| EmbedderError::InferenceFailed(format!("task join error: {e}")))?
            }
            Embedder::Mock(m) => {
                let m = *m;
                tokio::task::spawn_blocking(move || m.embed_batch(&prefixed))
                    .await
                    .map_err(|e| EmbedderError::InferenceFailed(format!("task join error: {e}")))?
            }
        }
    }

    /// Embed a single question.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let vectors = self
            .embed_batch(&[text.to_string()], EmbedTask::SearchQuery)
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::InferenceFailed("no embedding returned".to_string()))
    }
}
