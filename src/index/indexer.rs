//! The reconciling indexer: walks the vault, diffs file hashes against the
//! manifest, and drives adds, updates, and deletions through both stores.
//! Deterministic chunk IDs make the whole pass idempotent — an unchanged
//! vault costs zero storage writes.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::embedder::EmbedTask;
use crate::index::chunker::chunk_markdown;
use crate::index::manifest::ManifestEntry;
use crate::state::AppState;
use crate::store::vector::VectorRecord;

/// Note name patterns that are never indexed (drawings, canvases, scratch
/// files).
const EXCLUDED_PATTERNS: &[&str] = &[".excalidraw.md", ".canvas", "untitled"];

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub files_seen: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub removed: usize,
    pub failed: usize,
    pub total_chunks: usize,
}

/// Reconcile the vault with the stores. Concurrent passes are serialized by
/// the state's indexer mutex; per-file failures are logged and skipped so a
/// later pass retries them; the manifest is written once at the end.
pub async fn index_vault(state: &AppState, force: bool) -> Result<IndexReport> {
    let _guard = state.index_lock.lock().await;

    let vault = state.config.vault_path.clone();
    anyhow::ensure!(
        vault.is_dir(),
        "vault path {} is not a directory",
        vault.display()
    );

    let walk_root = vault.clone();
    let files = tokio::task::spawn_blocking(move || walk_vault(&walk_root))
        .await
        .context("vault walk task failed")?;

    let mut report = IndexReport {
        files_seen: files.len(),
        ..IndexReport::default()
    };

    // Files the manifest knows about but the walk no longer finds.
    let on_disk: HashSet<&String> = files.iter().collect();
    let vanished: Vec<String> = state
        .manifest
        .read()
        .sources()
        .into_iter()
        .filter(|source| !on_disk.contains(source))
        .collect();

    for source in vanished {
        let entry = state.manifest.write().remove(&source);
        if let Some(entry) = entry {
            state.vectors.delete(&entry.chunk_ids)?;
            state.lexical.delete(&entry.chunk_ids)?;
            report.removed += 1;
            tracing::info!("removed deleted note {source} ({} chunks)", entry.chunk_ids.len());
        }
    }

    for source in files {
        match index_file(state, &vault, &source, force).await {
            Ok(true) => report.indexed += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                tracing::warn!("failed to index {source}, will retry next pass: {e:#}");
                report.failed += 1;
            }
        }
    }

    report.total_chunks = state.vectors.count();
    state.manifest.read().save()?;

    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped,
        removed = report.removed,
        failed = report.failed,
        total_chunks = report.total_chunks,
        "index pass complete"
    );

    Ok(report)
}

/// Index a single file if its content hash differs from the manifest (or
/// unconditionally with `force`). Returns whether work was done.
async fn index_file(state: &AppState, vault: &Path, source: &str, force: bool) -> Result<bool> {
    let absolute = vault.join(source);
    let bytes = tokio::fs::read(&absolute)
        .await
        .with_context(|| format!("failed to read {}", absolute.display()))?;
    let content_hash = hex::encode(Sha256::digest(&bytes));

    if !force {
        if let Some(entry) = state.manifest.read().get(source) {
            if entry.content_hash == content_hash {
                return Ok(false);
            }
        }
    }

    let text = String::from_utf8_lossy(&bytes);
    let chunks = chunk_markdown(
        source,
        &text,
        state.config.chunk_size,
        state.config.chunk_overlap,
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = state
        .embedder
        .embed_batch(&texts, EmbedTask::SearchDocument)
        .await
        .map_err(|e| anyhow::anyhow!("embedding failed: {e}"))?;
    anyhow::ensure!(
        embeddings.len() == chunks.len(),
        "embedder returned {} vectors for {} chunks",
        embeddings.len(),
        chunks.len()
    );

    let records: Vec<VectorRecord> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| VectorRecord {
            chunk_id: chunk.id,
            source: chunk.source,
            position: chunk.position,
            text: chunk.text,
            links: chunk.links,
            embedding,
        })
        .collect();
    let new_ids: Vec<String> = records.iter().map(|r| r.chunk_id.clone()).collect();

    // Chunks from the previous version of this file that no longer exist.
    // Unchanged chunks hash to the same ID and are simply overwritten.
    let stale: Vec<String> = state
        .manifest
        .read()
        .get(source)
        .map(|entry| {
            entry
                .chunk_ids
                .iter()
                .filter(|id| !new_ids.contains(id))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if !stale.is_empty() {
        state.vectors.delete(&stale)?;
        state.lexical.delete(&stale)?;
    }
    state.vectors.upsert(records.clone())?;
    state.lexical.upsert(&records)?;

    state.manifest.write().insert(
        source.to_string(),
        ManifestEntry {
            content_hash,
            indexed_at: Utc::now(),
            chunk_ids: new_ids,
        },
    );

    Ok(true)
}

/// Collect vault-relative paths of all indexable markdown files. Hidden
/// directories (including our own `.obsidianrag` data dir) are skipped.
/// Discovery order is not meaningful; paths are sorted only so logs are
/// stable.
fn walk_vault(vault: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(vault)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_indexable(e.path()))
        .filter_map(|e| {
            e.path()
                .strip_prefix(vault)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_indexable(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return false;
    }
    !EXCLUDED_PATTERNS.iter().any(|p| name.contains(p))
}
