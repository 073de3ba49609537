//! In-memory vector store with disk persistence and cosine similarity
//! search, keyed by stable chunk IDs.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A stored (embedding, metadata, text) record for one chunk. Carries enough
/// of the chunk to reconstruct retrieval results without re-reading the
/// source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub source: String,
    pub position: usize,
    pub text: String,
    pub links: Vec<String>,
    pub embedding: Vec<f32>,
}

/// A similarity search result.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Records live in memory behind a readers-writer lock and are persisted as
/// JSON under the vault's data directory via temp-file + rename. The dense
/// dimension is fixed per instance; changing the embedder requires a rebuild.
pub struct VectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
    persist_path: PathBuf,
    dimension: usize,
}

impl VectorStore {
    pub fn open_or_create(db_dir: &Path, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(db_dir)
            .with_context(|| format!("failed to create {}", db_dir.display()))?;
        let persist_path = db_dir.join("records.json");

        let mut records: HashMap<String, VectorRecord> = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("failed to read vector store")?;
            serde_json::from_str::<Vec<VectorRecord>>(&data)
                .unwrap_or_default()
                .into_iter()
                .map(|r| (r.chunk_id.clone(), r))
                .collect()
        } else {
            HashMap::new()
        };

        // A dimension change means a different embedder produced the data;
        // discard it and let the next index pass rebuild from scratch.
        if records.values().any(|r| r.embedding.len() != dimension) {
            tracing::warn!(
                "vector store dimension mismatch (expected {dimension}), discarding persisted records"
            );
            records.clear();
        }

        Ok(Self {
            records: RwLock::new(records),
            persist_path,
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add or replace records by chunk ID. Atomic per call.
    pub fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            anyhow::ensure!(
                record.embedding.len() == self.dimension,
                "embedding for {} has dimension {}, store expects {}",
                record.chunk_id,
                record.embedding.len(),
                self.dimension
            );
        }

        let mut map = self.records.write();
        for record in records {
            map.insert(record.chunk_id.clone(), record);
        }
        self.persist(&map)
    }

    /// Remove records by chunk ID. Unknown IDs are ignored.
    pub fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut map = self.records.write();
        for id in ids {
            map.remove(id);
        }
        self.persist(&map)
    }

    /// Return the `k` most similar records by cosine similarity, descending.
    /// Equal scores order by chunk ID so results are stable across runs.
    pub fn query(&self, embedding: &[f32], k: usize) -> Vec<VectorHit> {
        let map = self.records.read();

        let mut scored: Vec<(f32, &VectorRecord)> = map
            .values()
            .map(|r| (cosine_similarity(embedding, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, r)| VectorHit {
                chunk_id: r.chunk_id.clone(),
                source: r.source.clone(),
                text: r.text.clone(),
                score,
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.records.read().contains_key(chunk_id)
    }

    /// Snapshot of all records, used for stats and lexical rebuilds.
    pub fn records(&self) -> Vec<VectorRecord> {
        self.records.read().values().cloned().collect()
    }

    fn persist(&self, map: &HashMap<String, VectorRecord>) -> Result<()> {
        let mut records: Vec<&VectorRecord> = map.values().collect();
        records.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));

        let data = serde_json::to_string(&records)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("failed to replace vector store file")?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
