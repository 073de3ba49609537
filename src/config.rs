use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Frozen application configuration. Composed once at startup from defaults,
/// environment variables, and CLI flags (in that order); the rest of the core
/// only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the Obsidian vault.
    pub vault_path: PathBuf,
    /// Loopback port the server binds to.
    pub bind_port: u16,
    /// Generative model name on the local model host.
    pub llm_model: String,
    /// "ollama" (HTTP) or "onnx" (in-process).
    pub embedder_provider: String,
    /// Embedding model name (used for task prefixes and the Ollama API).
    pub embedder_model: String,
    /// Dense vector dimension; fixed per vector-store instance.
    pub embedding_dim: usize,
    /// Directory holding model.onnx + tokenizer.json for the onnx provider.
    pub model_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Vector results fetched per question.
    pub retrieval_k: usize,
    /// BM25 results fetched per question.
    pub bm25_k: usize,
    pub vector_weight: f32,
    pub bm25_weight: f32,
    pub use_reranker: bool,
    /// Candidates kept after cross-encoder reranking.
    pub reranker_top_n: usize,
    /// Minimum score for retrieved candidates; the best one is kept even if
    /// everything falls below it.
    pub min_score: f32,
    pub ollama_base_url: String,
    /// Base URL of the cross-encoder sidecar; None degrades to fused scores.
    pub reranker_url: Option<String>,
    /// Model name sent to the cross-encoder sidecar.
    pub reranker_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::new(),
            bind_port: 8000,
            llm_model: "llama3.2".to_string(),
            embedder_provider: "ollama".to_string(),
            embedder_model: "nomic-embed-text".to_string(),
            embedding_dim: 768,
            model_dir: PathBuf::from("models/multilingual-e5-small"),
            chunk_size: 1500,
            chunk_overlap: 300,
            retrieval_k: 12,
            bm25_k: 5,
            vector_weight: 0.6,
            bm25_weight: 0.4,
            use_reranker: false,
            reranker_top_n: 6,
            min_score: 0.3,
            ollama_base_url: "http://localhost:11434".to_string(),
            reranker_url: None,
            reranker_model: "BAAI/bge-reranker-v2-m3".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("OBSIDIAN_VAULT") {
            config.vault_path = PathBuf::from(path);
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_PORT") {
            if let Ok(v) = val.parse() {
                config.bind_port = v;
            }
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm_model = model;
        }
        if let Ok(provider) = std::env::var("EMBEDDER_PROVIDER") {
            config.embedder_provider = provider;
        }
        if let Ok(model) = std::env::var("EMBEDDER_MODEL") {
            config.embedder_model = model;
        }
        if let Ok(val) = std::env::var("EMBEDDING_DIM") {
            if let Ok(v) = val.parse() {
                config.embedding_dim = v;
            }
        }
        if let Ok(dir) = std::env::var("EMBEDDER_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.chunk_size = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunk_overlap = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_RETRIEVAL_K") {
            if let Ok(v) = val.parse() {
                config.retrieval_k = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_BM25_K") {
            if let Ok(v) = val.parse() {
                config.bm25_k = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_VECTOR_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.vector_weight = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_BM25_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.bm25_weight = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_USE_RERANKER") {
            if let Ok(v) = val.parse() {
                config.use_reranker = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_RERANKER_TOP_N") {
            if let Ok(v) = val.parse() {
                config.reranker_top_n = v;
            }
        }
        if let Ok(val) = std::env::var("OBSIDIAN_RAG_MIN_SCORE") {
            if let Ok(v) = val.parse() {
                config.min_score = v;
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.ollama_base_url = url;
        }
        if let Ok(url) = std::env::var("RERANKER_URL") {
            config.reranker_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker_model = model;
        }

        config
    }

    /// Validate startup-critical values. A missing vault is fatal.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.vault_path.as_os_str().is_empty(),
            "vault path not configured (set OBSIDIAN_VAULT or pass --vault)"
        );
        anyhow::ensure!(
            self.vault_path.is_dir(),
            "vault path {} does not exist or is not a directory",
            self.vault_path.display()
        );
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.embedding_dim > 0, "embedding_dim must be positive");
        anyhow::ensure!(
            self.retrieval_k > 0 && self.bm25_k > 0,
            "retrieval_k and bm25_k must be positive"
        );
        Ok(())
    }

    /// The server is loopback-only.
    pub fn bind_addr(&self) -> String {
        format!("127.0.0.1:{}", self.bind_port)
    }

    /// All persisted state lives inside the vault under `.obsidianrag/`.
    pub fn data_dir(&self) -> PathBuf {
        self.vault_path.join(".obsidianrag")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.data_dir().join("db")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir().join("manifest.json")
    }
}
