use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::embedder::Embedder;
use crate::index::manifest::Manifest;
use crate::store::lexical::LexicalIndex;
use crate::store::vector::VectorStore;

/// The single process-wide state object, constructed at startup and passed
/// into every request handler. Writes to the manifest and stores during
/// indexing are serialized by `index_lock`; reads are concurrent.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub vectors: Arc<VectorStore>,
    pub lexical: Arc<LexicalIndex>,
    pub manifest: Arc<RwLock<Manifest>>,
    pub embedder: Arc<Embedder>,
    pub http_client: reqwest::Client,
    pub index_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, embedder: Embedder) -> Result<Self> {
        std::fs::create_dir_all(config.db_dir())?;

        let vectors = VectorStore::open_or_create(&config.db_dir(), embedder.dimension())?;
        let manifest = Manifest::load(&config.manifest_path())?;

        // The lexical index is in-memory only: rebuild it from whatever the
        // vector store persisted. The indexer keeps it in sync from here on.
        let lexical = LexicalIndex::new();
        let records = vectors.records();
        if !records.is_empty() {
            lexical.rebuild(&records)?;
            tracing::info!("lexical index rebuilt from {} persisted chunks", records.len());
        }

        // Every call through this client is capped at 120 s unless it sets
        // its own per-request timeout; the open-ended generation stream
        // overrides this and is bounded by the orchestrator's idle timeout.
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            vectors: Arc::new(vectors),
            lexical: Arc::new(lexical),
            manifest: Arc::new(RwLock::new(manifest)),
            embedder: Arc::new(embedder),
            http_client,
            index_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }
}
