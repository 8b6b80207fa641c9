//! Temp-file-plus-rename JSON persistence.

use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StateError, StateResult};

/// Durable store for a single JSON document.
///
/// `T` is the document type; a missing file loads as `T::default()`.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Creates a store backed by the given path. Nothing is touched on disk
    /// until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reports whether the backing file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the full document.
    ///
    /// A missing file is the first-run case and yields `T::default()`.
    ///
    /// # Errors
    /// Returns [`StateError::Corrupt`] when the file exists but does not
    /// parse, and [`StateError::Io`] for other filesystem failures.
    pub fn load(&self) -> StateResult<T> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| StateError::corrupt(&self.path, e.to_string()))
    }

    /// Writes the full document atomically.
    ///
    /// The document is serialized into `<path>.tmp`, fsynced, and renamed
    /// over the destination, so observers see old or new content but never
    /// a partial write.
    ///
    /// # Errors
    /// Returns [`StateError::Serialization`] or [`StateError::Io`].
    pub fn save(&self, document: &T) -> StateResult<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        tracing::trace!(path = %self.path.display(), bytes = json.len(), "state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        entries: HashMap<String, u64>,
        note: Option<String>,
    }

    fn store_in(dir: &tempfile::TempDir) -> JsonStore<Doc> {
        JsonStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_load_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), Doc::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut doc = Doc::default();
        doc.entries.insert("a".to_string(), 1);
        doc.entries.insert("b".to_string(), 2);
        doc.note = Some("hello".to_string());

        store.save(&doc).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), doc);
    }

    #[test]
    fn test_save_overwrites_completely() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut first = Doc::default();
        first.entries.insert("gone".to_string(), 9);
        store.save(&first).unwrap();

        let second = Doc::default();
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&Doc::default()).unwrap();

        let tmp = store.path().with_extension("tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("nested/deeper/state.json"));
        store.save(&Doc::default()).unwrap();
        assert!(store.exists());
    }
}
