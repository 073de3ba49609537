//! Wiki-link graph expansion: documents directly linked from retrieved
//! chunks are pulled in whole as additional context, tagged `linked`.
//! Expansion is bounded to depth 1 with a dedup set on source path.

use std::collections::HashSet;
use std::path::Path;

use crate::index::chunker::{chunk_id, extract_wiki_links};
use crate::models::{Candidate, Provenance};

/// Fixed provenance score for linked documents: below the default threshold
/// floor, so link-following never outranks direct retrieval.
pub const LINKED_SCORE: f32 = 0.2;

/// At most this many linked documents are appended per question.
const MAX_LINKED_DOCS: usize = 5;

/// Follow outbound wiki-links from the candidates and append unseen linked
/// documents. Broken links, unreadable files, and empty notes are silently
/// dropped; expansion never fails the question.
pub async fn expand_links(
    vault: &Path,
    known_sources: &[String],
    candidates: &[Candidate],
) -> Vec<Candidate> {
    let mut expanded = candidates.to_vec();
    let mut seen: HashSet<String> = candidates.iter().map(|c| c.source.clone()).collect();

    // Collect link targets in candidate order, first occurrence wins.
    let mut target_seen = HashSet::new();
    let mut targets = Vec::new();
    for candidate in candidates {
        for link in extract_wiki_links(&candidate.text) {
            if target_seen.insert(link.clone()) {
                targets.push(link);
            }
        }
    }

    let mut added = 0usize;
    for target in targets {
        if added >= MAX_LINKED_DOCS {
            break;
        }
        let Some(source) = resolve_target(&target, known_sources) else {
            continue;
        };
        if seen.contains(&source) {
            continue;
        }
        let Ok(text) = tokio::fs::read_to_string(vault.join(&source)).await else {
            tracing::debug!("linked note {source} could not be read, skipping");
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }

        expanded.push(Candidate {
            chunk_id: chunk_id(&source, 0, &text),
            source: source.clone(),
            text,
            bm25_score: 0.0,
            vector_score: 0.0,
            score: LINKED_SCORE,
            provenance: Provenance::Linked,
        });
        seen.insert(source);
        added += 1;
    }

    expanded
}

/// Resolve a wiki-link target to an indexed source path. Exact relative-path
/// match wins (folder qualifiers respected); otherwise fall back to a
/// case-insensitive basename match. Several notes sharing a basename resolve
/// to the lexicographically first, so resolution is deterministic.
pub fn resolve_target(target: &str, known_sources: &[String]) -> Option<String> {
    let want = if target.to_lowercase().ends_with(".md") {
        target.to_string()
    } else {
        format!("{target}.md")
    };

    if let Some(exact) = known_sources.iter().find(|s| s.as_str() == want) {
        return Some(exact.clone());
    }

    let stem = Path::new(&want)
        .file_stem()?
        .to_string_lossy()
        .to_lowercase();

    let mut matches: Vec<&String> = known_sources
        .iter()
        .filter(|s| {
            Path::new(s)
                .file_stem()
                .map(|f| f.to_string_lossy().to_lowercase() == stem)
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.first().map(|s| (*s).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    fn candidate(source: &str, text: &str) -> Candidate {
        Candidate {
            chunk_id: format!("id-{source}"),
            source: source.to_string(),
            text: text.to_string(),
            bm25_score: 0.0,
            vector_score: 0.0,
            score: 0.8,
            provenance: Provenance::Vector,
        }
    }

    // ── target resolution ───────────────────────────────

    #[test]
    fn test_resolve_exact_path_with_folder() {
        let known = sources(&["projects/Soil.md", "Soil.md"]);
        assert_eq!(
            resolve_target("projects/Soil", &known),
            Some("projects/Soil.md".to_string())
        );
    }

    #[test]
    fn test_resolve_falls_back_to_basename() {
        let known = sources(&["archive/Garden Notes.md"]);
        assert_eq!(
            resolve_target("garden notes", &known),
            Some("archive/Garden Notes.md".to_string())
        );
    }

    #[test]
    fn test_resolve_broken_link() {
        assert_eq!(resolve_target("No Such Note", &sources(&["a.md"])), None);
    }

    #[test]
    fn test_resolve_ambiguous_basename_is_deterministic() {
        let known = sources(&["z/Note.md", "a/Note.md"]);
        assert_eq!(resolve_target("Note", &known), Some("a/Note.md".to_string()));
    }

    // ── expansion ───────────────────────────────────────

    #[tokio::test]
    async fn test_expand_appends_linked_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "Linked content").unwrap();

        let known = sources(&["a.md", "b.md"]);
        let candidates = vec![candidate("a.md", "Hello [[b]]")];

        let expanded = expand_links(dir.path(), &known, &candidates).await;
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[1].source, "b.md");
        assert_eq!(expanded[1].provenance, Provenance::Linked);
        assert!((expanded[1].score - LINKED_SCORE).abs() < 1e-6);
        assert_eq!(expanded[1].text, "Linked content");
    }

    #[tokio::test]
    async fn test_expand_skips_already_retrieved_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "content").unwrap();

        let known = sources(&["a.md", "b.md"]);
        let candidates = vec![candidate("a.md", "see [[b]]"), candidate("b.md", "chunk of b")];

        let expanded = expand_links(dir.path(), &known, &candidates).await;
        assert_eq!(expanded.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_links_leave_candidates_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let known = sources(&["a.md"]);
        let candidates = vec![candidate("a.md", "[[missing]] and [[also missing]]")];

        let expanded = expand_links(dir.path(), &known, &candidates).await;
        assert_eq!(expanded.len(), 1);
    }

    #[tokio::test]
    async fn test_linked_file_missing_on_disk_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // b.md is in the manifest but was deleted from disk.
        let known = sources(&["a.md", "b.md"]);
        let candidates = vec![candidate("a.md", "[[b]]")];

        let expanded = expand_links(dir.path(), &known, &candidates).await;
        assert_eq!(expanded.len(), 1);
    }

    #[tokio::test]
    async fn test_expansion_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut known = vec!["a.md".to_string()];
        let mut text = String::new();
        for i in 0..10 {
            let name = format!("n{i}.md");
            std::fs::write(dir.path().join(&name), format!("note {i}")).unwrap();
            text.push_str(&format!("[[n{i}]] "));
            known.push(name);
        }

        let expanded = expand_links(dir.path(), &known, &[candidate("a.md", &text)]).await;
        assert_eq!(expanded.len(), 1 + 5);
    }
}
