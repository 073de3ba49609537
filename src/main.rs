use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use obsidian_rag::api;
use obsidian_rag::config::Config;
use obsidian_rag::embedder::Embedder;
use obsidian_rag::index::indexer::index_vault;
use obsidian_rag::llm::generate::list_models;
use obsidian_rag::state::AppState;

/// Question-answering server for an Obsidian vault.
#[derive(Parser, Debug)]
#[command(name = "obsidian-rag", about = "Local RAG server for Obsidian notes", version)]
struct Cli {
    /// Path to the Obsidian vault (env: OBSIDIAN_VAULT)
    #[arg(long)]
    vault: Option<std::path::PathBuf>,

    /// Port to bind on loopback (env: OBSIDIAN_RAG_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Generative model name on the local model host (env: LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Enable or disable the cross-encoder reranker
    #[arg(long)]
    reranker: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    // Defaults → environment → CLI flags.
    let mut config = Config::from_env();
    if let Some(vault) = cli.vault {
        config.vault_path = vault;
    }
    if let Some(port) = cli.port {
        config.bind_port = port;
    }
    if let Some(model) = cli.model {
        config.llm_model = model;
    }
    if let Some(reranker) = cli.reranker {
        config.use_reranker = reranker;
    }

    if let Err(e) = config.validate() {
        eprintln!("obsidian-rag: {e}");
        std::process::exit(1);
    }

    tracing::info!("vault: {}", config.vault_path.display());
    tracing::info!(
        "model: {} via {} (embedder: {}/{})",
        config.llm_model,
        config.ollama_base_url,
        config.embedder_provider,
        config.embedder_model
    );

    let embedder = match Embedder::from_config(&config) {
        Ok(embedder) => embedder,
        Err(e) => {
            eprintln!("obsidian-rag: {e}");
            std::process::exit(1);
        }
    };

    let state = AppState::new(config, embedder)?;

    // Best-effort model host probe; generation errors surface per request.
    match list_models(&state.http_client, &state.config.ollama_base_url).await {
        Ok(models) => {
            if !models.iter().any(|m| {
                m == &state.config.llm_model
                    || m.split(':').next() == Some(state.config.llm_model.as_str())
            }) {
                tracing::warn!(
                    "model {} not found on the host (available: {models:?})",
                    state.config.llm_model
                );
            }
        }
        Err(e) => tracing::warn!("model host not reachable yet: {e}"),
    }

    // Reconcile the vault before accepting questions; a no-op when the
    // manifest is current.
    let report = index_vault(&state, false).await?;
    tracing::info!(
        "startup index: {} indexed, {} unchanged, {} removed, {} failed, {} chunks total",
        report.indexed,
        report.skipped,
        report.removed,
        report.failed,
        report.total_chunks
    );

    let app = Router::new()
        .route("/health", get(api::admin::health))
        .route("/stats", get(api::admin::stats))
        .route("/ask", post(api::ask::ask))
        .route("/ask/stream", post(api::ask::ask_stream))
        .route("/rebuild_db", post(api::admin::rebuild_db))
        .with_state(state.clone());

    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
