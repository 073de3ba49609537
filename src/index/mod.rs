//! Indexing subsystem: markdown chunking, the file manifest, and the
//! reconciling indexer that keeps the stores in sync with the vault.

pub mod chunker;
pub mod indexer;
pub mod manifest;
