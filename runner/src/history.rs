//! Log of tested bundle identifiers and paths.
//!
//! Stored as a flat key/value JSON object so other tools can read it without
//! this crate. Entries that fail to parse are dropped on load rather than
//! failing the whole file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BUNDLE_HISTORY_KEY: &str = "TestedBundleIDsHistory";
pub const PATH_HISTORY_KEY: &str = "TestedPathsHistory";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("failed to parse history {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("failed to write history {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("no {kind} history entry at index {index} (have {len})")]
    NoSuchEntry {
        kind: &'static str,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub id: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    pub path: String,
    pub success: bool,
}

/// What a caller needs from a history backend: one append per probe call.
pub trait HistorySink {
    fn record_bundle(&mut self, id: &str, success: bool) -> Result<(), HistoryError>;
    fn record_path(&mut self, path: &str, success: bool) -> Result<(), HistoryError>;
}

/// Sink for `--no-history`.
pub struct Discard;

impl HistorySink for Discard {
    fn record_bundle(&mut self, _id: &str, _success: bool) -> Result<(), HistoryError> {
        Ok(())
    }

    fn record_path(&mut self, _path: &str, _success: bool) -> Result<(), HistoryError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct IndexedBundle {
    pub index: usize,
    #[serde(flatten)]
    pub record: BundleRecord,
}

#[derive(Debug, Serialize)]
pub struct GroupedHistory {
    pub apple_bundle_ids: Vec<IndexedBundle>,
    pub other_bundle_ids: Vec<IndexedBundle>,
    pub paths: Vec<PathRecord>,
}

#[derive(Debug)]
pub struct HistoryFile {
    path: PathBuf,
    bundles: Vec<BundleRecord>,
    paths: Vec<PathRecord>,
}

impl HistoryFile {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let mut history = HistoryFile {
            path: path.to_path_buf(),
            bundles: Vec::new(),
            paths: Vec::new(),
        };
        if !path.exists() {
            return Ok(history);
        }

        let data = std::fs::read_to_string(path).map_err(|e| HistoryError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root: Map<String, Value> =
            serde_json::from_str(&data).map_err(|e| HistoryError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        history.bundles = records(&root, BUNDLE_HISTORY_KEY);
        history.paths = records(&root, PATH_HISTORY_KEY);
        Ok(history)
    }

    #[allow(dead_code)]
    pub fn bundles(&self) -> &[BundleRecord] {
        &self.bundles
    }

    #[allow(dead_code)]
    pub fn paths(&self) -> &[PathRecord] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty() && self.paths.is_empty()
    }

    pub fn grouped(&self) -> GroupedHistory {
        let (apple, other): (Vec<_>, Vec<_>) = self
            .bundles
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, record)| IndexedBundle { index, record })
            .partition(|entry| entry.record.id.contains("apple"));
        GroupedHistory {
            apple_bundle_ids: apple,
            other_bundle_ids: other,
            paths: self.paths.clone(),
        }
    }

    pub fn remove_bundle(&mut self, index: usize) -> Result<BundleRecord, HistoryError> {
        if index >= self.bundles.len() {
            return Err(HistoryError::NoSuchEntry {
                kind: "bundle",
                index,
                len: self.bundles.len(),
            });
        }
        let removed = self.bundles.remove(index);
        self.save()?;
        Ok(removed)
    }

    pub fn remove_path(&mut self, index: usize) -> Result<PathRecord, HistoryError> {
        if index >= self.paths.len() {
            return Err(HistoryError::NoSuchEntry {
                kind: "path",
                index,
                len: self.paths.len(),
            });
        }
        let removed = self.paths.remove(index);
        self.save()?;
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.bundles.clear();
        self.paths.clear();
        self.save()
    }

    pub fn save(&self) -> Result<(), HistoryError> {
        let encode_err = |e: serde_json::Error| HistoryError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        let mut root = Map::new();
        root.insert(
            BUNDLE_HISTORY_KEY.to_string(),
            serde_json::to_value(&self.bundles).map_err(encode_err)?,
        );
        root.insert(
            PATH_HISTORY_KEY.to_string(),
            serde_json::to_value(&self.paths).map_err(encode_err)?,
        );
        let text = serde_json::to_string_pretty(&root).map_err(encode_err)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HistoryError::Write {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(&self.path, text).map_err(|e| HistoryError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl HistorySink for HistoryFile {
    fn record_bundle(&mut self, id: &str, success: bool) -> Result<(), HistoryError> {
        self.bundles.push(BundleRecord {
            id: id.to_string(),
            success,
        });
        self.save()
    }

    fn record_path(&mut self, path: &str, success: bool) -> Result<(), HistoryError> {
        self.paths.push(PathRecord {
            path: path.to_string(),
            success,
        });
        self.save()
    }
}

fn records<T: for<'de> Deserialize<'de>>(root: &Map<String, Value>, key: &str) -> Vec<T> {
    let Some(Value::Array(items)) = root.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(key, idx, error = %err, "skipping malformed history entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryFile::open(&dir.path().join("history.json")).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn records_persist_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.json");

        let mut history = HistoryFile::open(&path).unwrap();
        history.record_bundle("com.apple.tips", true).unwrap();
        history.record_path("/var/mobile", false).unwrap();

        let reopened = HistoryFile::open(&path).unwrap();
        assert_eq!(
            reopened.bundles(),
            [BundleRecord {
                id: "com.apple.tips".to_string(),
                success: true
            }]
        );
        assert_eq!(reopened.paths().len(), 1);
        assert!(!reopened.paths()[0].success);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[BUNDLE_HISTORY_KEY][0]["id"], "com.apple.tips");
        assert_eq!(raw[PATH_HISTORY_KEY][0]["path"], "/var/mobile");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"{
  "TestedBundleIDsHistory": [
    {"id": "com.apple.tips", "success": true},
    {"id": "missing-success"},
    {"id": 7, "success": false}
  ],
  "TestedPathsHistory": "not-an-array"
}"#,
        )
        .unwrap();
        let history = HistoryFile::open(&path).unwrap();
        assert_eq!(history.bundles().len(), 1);
        assert!(history.paths().is_empty());
    }

    #[test]
    fn groups_apple_ids_with_original_indices() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = HistoryFile::open(&dir.path().join("history.json")).unwrap();
        history.record_bundle("com.example.game", false).unwrap();
        history.record_bundle("com.apple.tips", true).unwrap();
        history.record_bundle("org.example.apple-fan", false).unwrap();

        let grouped = history.grouped();
        let apple: Vec<usize> = grouped.apple_bundle_ids.iter().map(|e| e.index).collect();
        let other: Vec<usize> = grouped.other_bundle_ids.iter().map(|e| e.index).collect();
        assert_eq!(apple, vec![1, 2]);
        assert_eq!(other, vec![0]);
    }

    #[test]
    fn removes_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut history = HistoryFile::open(&path).unwrap();
        history.record_bundle("a", true).unwrap();
        history.record_bundle("b", false).unwrap();
        history.record_path("/tmp", true).unwrap();

        let removed = history.remove_bundle(0).unwrap();
        assert_eq!(removed.id, "a");
        assert!(matches!(
            history.remove_path(5),
            Err(HistoryError::NoSuchEntry { kind: "path", index: 5, len: 1 })
        ));
        assert_eq!(HistoryFile::open(&path).unwrap().bundles()[0].id, "b");

        history.clear().unwrap();
        assert!(HistoryFile::open(&path).unwrap().is_empty());
    }

    #[test]
    fn discard_accepts_everything() {
        let mut sink = Discard;
        sink.record_bundle("com.apple.tips", true).unwrap();
        sink.record_path("/", true).unwrap();
    }
}
