//! Markdown chunker: overlapping character windows that prefer structural
//! boundaries, wiki-link extraction, and deterministic chunk IDs.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::Chunk;

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").unwrap());

/// Split a note into overlapping chunks. Empty or whitespace-only content
/// yields no chunks; content at most `chunk_size` characters yields one.
pub fn chunk_markdown(
    source: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    split_windows(text, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(position, window)| Chunk {
            id: chunk_id(source, position, &window),
            source: source.to_string(),
            position,
            links: extract_wiki_links(&window),
            text: window,
        })
        .collect()
}

/// Extract `[[target]]` / `[[target|alias]]` wiki-link targets. The alias is
/// stripped; case and folder prefixes are preserved; duplicates are dropped
/// keeping first occurrence order.
pub fn extract_wiki_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for captures in WIKI_LINK.captures_iter(text) {
        let target = captures[1]
            .split('|')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if !target.is_empty() && seen.insert(target.clone()) {
            links.push(target);
        }
    }

    links
}

/// Deterministic chunk ID: identical (source, position, text) always hashes
/// to the same ID, so re-chunking unchanged content costs no storage writes.
pub fn chunk_id(source: &str, position: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(position.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Window the text by character count. Each split searches backwards from
/// the size limit for a paragraph break, then a sentence boundary, then any
/// whitespace, before forcing a mid-word cut.
fn split_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_split_point(&chars, start, hard_end)
        };

        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // Step back for overlap, but always make forward progress.
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }

    windows
}

/// Search backwards within the second half of the window for the best split.
fn find_split_point(chars: &[char], start: usize, hard_end: usize) -> usize {
    let min = start + (hard_end - start) / 2;

    // Paragraph break
    for i in (min..hard_end).rev() {
        if chars[i] == '\n' && i > 0 && chars[i - 1] == '\n' {
            return i + 1;
        }
    }
    // Sentence boundary
    for i in (min..hard_end).rev() {
        if matches!(chars[i], '.' | '!' | '?' | '\n' | '。') {
            return i + 1;
        }
    }
    // Any whitespace
    for i in (min..hard_end).rev() {
        if chars[i].is_whitespace() {
            return i + 1;
        }
    }

    hard_end
}
