//! Health, vault statistics, and the forced-reindex endpoint.

use std::collections::HashSet;
use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::index::indexer::index_vault;
use crate::models::{HealthResponse, RebuildResponse, StatsResponse};
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.llm_model.clone(),
    })
}

/// GET /stats — vault statistics computed from the vector store snapshot.
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let records = state.vectors.records();

    let total_chunks = records.len();
    // Characters, not bytes: vaults are full of multi-byte text.
    let total_chars: usize = records.iter().map(|r| r.text.chars().count()).sum();
    let total_words: usize = records
        .iter()
        .map(|r| r.text.split_whitespace().count())
        .sum();

    let mut notes = HashSet::new();
    let mut folders = HashSet::new();
    let mut links = HashSet::new();

    for record in &records {
        notes.insert(record.source.as_str());
        if let Some(folder) = Path::new(&record.source)
            .parent()
            .and_then(|p| p.file_name())
        {
            folders.insert(folder.to_string_lossy().into_owned());
        }
        for link in &record.links {
            links.insert(link.as_str());
        }
    }

    let vault_path = state
        .config
        .vault_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| state.config.vault_path.display().to_string());

    Json(StatsResponse {
        total_notes: notes.len(),
        total_chunks,
        total_words,
        total_chars,
        avg_words_per_chunk: if total_chunks > 0 {
            total_words / total_chunks
        } else {
            0
        },
        folders: folders.len(),
        internal_links: links.len(),
        vault_path,
    })
}

/// POST /rebuild_db — force a full reindex of the vault.
pub async fn rebuild_db(
    State(state): State<AppState>,
) -> Result<Json<RebuildResponse>, (StatusCode, String)> {
    tracing::info!("forced reindex requested");

    let report = index_vault(&state, true).await.map_err(|e| {
        tracing::error!("forced reindex failed: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("reindex failed: {e:#}"),
        )
    })?;

    Ok(Json(RebuildResponse {
        status: "ok".to_string(),
        total_chunks: report.total_chunks,
    }))
}
