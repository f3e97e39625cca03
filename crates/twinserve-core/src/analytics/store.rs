use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::StoreError;
use crate::util::ensure_dir;

use super::AnalyticsData;

/// Storage seam for the analytics document. The document is small enough
/// that load and save always move it whole.
pub trait AnalyticsStore: Send + Sync {
    /// Load the current document. A missing or unreadable document
    /// bootstraps an empty one; read failures are never surfaced.
    fn load(&self) -> AnalyticsData;

    /// Persist the full document. Write failures are real errors.
    fn save(&self, data: &AnalyticsData) -> Result<(), StoreError>;
}

/// File-backed store: one JSON document on local disk.
pub struct FileAnalyticsStore {
    path: PathBuf,
}

impl FileAnalyticsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalyticsStore for FileAnalyticsStore {
    fn load(&self) -> AnalyticsData {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "Failed to parse analytics data at {}: {}; starting fresh",
                        self.path.display(),
                        e
                    );
                    AnalyticsData::default()
                }
            },
            Err(_) => AnalyticsData::default(),
        }
    }

    fn save(&self, data: &AnalyticsData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent).map_err(|e| StoreError::Write(e.to_string()))?;
            }
        }
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

/// In-memory store, used by tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryAnalyticsStore {
    data: Mutex<Option<AnalyticsData>>,
}

impl MemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalyticsStore for MemoryAnalyticsStore {
    fn load(&self) -> AnalyticsData {
        self.data.lock().unwrap().clone().unwrap_or_default()
    }

    fn save(&self, data: &AnalyticsData) -> Result<(), StoreError> {
        *self.data.lock().unwrap() = Some(data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_bootstrap_on_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileAnalyticsStore::new(tmp.path().join("nope.json"));
        let data = store.load();
        assert!(data.events.is_empty());
        assert_eq!(data.summary.total_visits, 0);
    }

    #[test]
    fn test_file_store_bootstrap_on_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileAnalyticsStore::new(&path);
        let data = store.load();
        assert!(data.events.is_empty());
    }

    #[test]
    fn test_file_store_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileAnalyticsStore::new(tmp.path().join("data.json"));

        let mut data = AnalyticsData::default();
        data.summary.total_visits = 7;
        store.save(&data).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.summary.total_visits, 7);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryAnalyticsStore::new();
        assert!(store.load().events.is_empty());

        let mut data = AnalyticsData::default();
        data.summary.total_messages = 3;
        store.save(&data).unwrap();
        assert_eq!(store.load().summary.total_messages, 3);
    }
}
