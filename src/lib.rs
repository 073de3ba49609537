//! # obsidian-rag
//!
//! A local question-answering server for an Obsidian vault. Markdown notes
//! are chunked, embedded, and indexed; questions are answered by a hybrid
//! BM25 + vector retrieval pipeline with optional cross-encoder reranking and
//! wiki-link graph expansion, feeding a locally hosted generative model whose
//! tokens are streamed back to the client over SSE.
//!
//! ## Answer pipeline
//!
//! ```text
//!   Question
//!      │
//!      ├── embed once ─────────────────┐
//!      ▼                               ▼
//!   BM25 (tantivy, in-RAM)      Vector store (cosine)
//!      │                               │
//!      └──────── max-normalize ────────┘
//!                     │
//!          weighted fusion (0.6 vector / 0.4 bm25)
//!                     │
//!          cross-encoder rerank (optional)
//!                     │
//!          min-score threshold
//!                     │
//!          wiki-link expansion (depth 1)
//!                     │
//!          prompt → model host → token stream → SSE
//! ```
//!
//! ## Module overview
//!
//! - [`config`] - One frozen configuration record composed from env + CLI
//! - [`models`] - Shared data types: `Chunk`, `Candidate`, `ScoredSource`, wire types
//! - [`error`] - Client-facing error categories
//! - [`index`] - Markdown chunking, the on-disk manifest, and the reconciling indexer
//! - [`store`] - Persistent vector store and in-memory tantivy BM25 index
//! - [`embedder`] - Embedding providers: Ollama HTTP, in-process ONNX, test mock
//! - [`llm`] - Streaming generation and cross-encoder reranking clients
//! - [`retrieval`] - Hybrid fusion, rerank/threshold stage, graph expansion
//! - [`qa`] - The two-stage orchestrator producing the progress event stream
//! - [`api`] - Axum HTTP handlers: health, stats, ask, ask/stream, rebuild
//! - [`state`] - Shared application state constructed once at startup

pub mod api;
pub mod config;
pub mod embedder;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod qa;
pub mod retrieval;
pub mod state;
pub mod store;
