//! The manifest: the authoritative on-disk record of which source files have
//! been indexed, at which content hash, into which chunk IDs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-file manifest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Hex SHA-256 of the file bytes at last successful indexing.
    pub content_hash: String,
    pub indexed_at: DateTime<Utc>,
    /// Chunk IDs produced from this file, in chunk order.
    pub chunk_ids: Vec<String>,
}

/// Maps vault-relative source path → [`ManifestEntry`]. Writes go through a
/// temp file and atomic rename so the on-disk manifest is never torn.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read manifest {}", path.display()))?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Persist atomically: write a temp file next to the target, then rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.entries)
            .context("failed to serialize manifest")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    pub fn get(&self, source: &str) -> Option<&ManifestEntry> {
        self.entries.get(source)
    }

    pub fn insert(&mut self, source: String, entry: ManifestEntry) {
        self.entries.insert(source, entry);
    }

    pub fn remove(&mut self, source: &str) -> Option<ManifestEntry> {
        self.entries.remove(source)
    }

    pub fn sources(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> &HashMap<String, ManifestEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: &str, ids: &[&str]) -> ManifestEntry {
        ManifestEntry {
            content_hash: hash.to_string(),
            indexed_at: Utc::now(),
            chunk_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.insert("a.md".into(), entry("hash-a", &["c1", "c2"]));
        manifest.insert("sub/b.md".into(), entry("hash-b", &["c3"]));
        manifest.save().unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("a.md").unwrap().chunk_ids, vec!["c1", "c2"]);
        assert_eq!(reloaded.get("sub/b.md").unwrap().content_hash, "hash-b");
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.insert("a.md".into(), entry("v1", &["c1"]));
        manifest.save().unwrap();

        manifest.remove("a.md");
        manifest.insert("b.md".into(), entry("v2", &["c2"]));
        manifest.save().unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        assert!(reloaded.get("a.md").is_none());
        assert_eq!(reloaded.get("b.md").unwrap().content_hash, "v2");
        // No stray temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_manifest_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert!(manifest.is_empty());
    }
}
