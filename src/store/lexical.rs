//! BM25 keyword index built on tantivy, held entirely in RAM. Rebuilt from
//! the vector store's persisted records at startup and kept in sync on every
//! chunk upsert/delete during index passes.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::store::vector::VectorRecord;

const WRITER_HEAP_BYTES: usize = 15_000_000;

/// A BM25 search result.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

struct Inner {
    index: Index,
    f_chunk_id: Field,
    f_source: Field,
    f_text: Field,
}

impl Inner {
    fn new() -> Self {
        let mut schema_builder = Schema::builder();
        let f_chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let f_source = schema_builder.add_text_field("source", STRING | STORED);
        let f_text = schema_builder.add_text_field("text", TEXT | STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        Self {
            index,
            f_chunk_id,
            f_source,
            f_text,
        }
    }

    fn add_records(&self, writer: &mut IndexWriter, records: &[VectorRecord]) -> Result<()> {
        for record in records {
            writer.add_document(doc!(
                self.f_chunk_id => record.chunk_id.clone(),
                self.f_source => record.source.clone(),
                self.f_text => record.text.clone(),
            ))?;
        }
        Ok(())
    }
}

/// Many concurrent readers, exclusive writer during rebuilds and sync.
pub struct LexicalIndex {
    inner: RwLock<Inner>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    /// Replace the whole index with one built from the given records.
    pub fn rebuild(&self, records: &[VectorRecord]) -> Result<()> {
        let fresh = Inner::new();
        let mut writer: IndexWriter = fresh
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("failed to create index writer")?;
        fresh.add_records(&mut writer, records)?;
        writer.commit().context("failed to commit rebuild")?;

        *self.inner.write() = fresh;
        Ok(())
    }

    /// Add or replace documents by chunk ID.
    pub fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let inner = self.inner.write();
        let mut writer: IndexWriter = inner
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("failed to create index writer")?;

        for record in records {
            let term = tantivy::Term::from_field_text(inner.f_chunk_id, &record.chunk_id);
            writer.delete_term(term);
        }
        inner.add_records(&mut writer, records)?;
        writer.commit().context("failed to commit upsert")?;
        Ok(())
    }

    /// Remove documents by chunk ID.
    pub fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let inner = self.inner.write();
        let mut writer: IndexWriter = inner
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("failed to create index writer")?;

        for id in ids {
            let term = tantivy::Term::from_field_text(inner.f_chunk_id, id);
            writer.delete_term(term);
        }
        writer.commit().context("failed to commit delete")?;
        Ok(())
    }

    /// BM25 search over chunk text. Questions are free-form natural language,
    /// so the query is parsed leniently and unparseable fragments are dropped.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let reader = inner
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("failed to create reader")?;
        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&inner.index, vec![inner.f_text]);
        let (query, _errors) = query_parser.parse_query_lenient(query_str);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("BM25 search failed")?;

        let mut hits = Vec::new();
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("failed to retrieve document")?;

            let field_str = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };

            hits.push(LexicalHit {
                chunk_id: field_str(inner.f_chunk_id),
                source: field_str(inner.f_source),
                text: field_str(inner.f_text),
                score,
            });
        }

        Ok(hits)
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}
