//! Persistent flag storage: string keys to stringified timestamps.
//!
//! The banner runs one page visit at a time, so the store only needs
//! last-write-wins semantics. Operations are infallible from the caller's
//! point of view; the file store logs write failures instead of surfacing
//! them.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, info, warn};

/// Durable key/value store for banner flags.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Every stored pair, sorted by key.
    fn entries(&self) -> Vec<(String, String)>;
}

/// In-memory store. Lost when dropped; used by tests and one-shot visits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flags: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_flags<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> R {
        let mut guard = self
            .flags
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl FlagStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.with_flags(|flags| flags.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        self.with_flags(|flags| flags.insert(key.to_string(), value.to_string()));
    }

    fn remove(&self, key: &str) {
        self.with_flags(|flags| flags.remove(key));
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.with_flags(|flags| {
            flags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }
}

/// JSON-file store. The whole map is loaded on open and rewritten on every
/// mutation, so flags survive across `nudge visit` invocations.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    flags: MemoryStore,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file starts empty; an unreadable or corrupt file also starts
    /// empty and is overwritten on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let flags = MemoryStore::new();
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<BTreeMap<String, String>>(&data) {
                Ok(map) => {
                    debug!(path = %path.display(), count = map.len(), "loaded flag store");
                    flags.with_flags(|f| *f = map);
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "flag store parse failed, starting empty");
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "flag store not found, starting empty");
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "flag store read failed, starting empty");
            },
        }
        Self { path, flags }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        if let Err(e) = self.write_file() {
            warn!(path = %self.path.display(), error = %e, "flag store write failed");
        }
    }

    fn write_file(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let data = self.flags.with_flags(|f| serde_json::to_string_pretty(f))?;
        std::fs::write(&self.path, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl FlagStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.flags.get(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.flags.set(key, value);
        self.persist();
    }

    fn remove(&self, key: &str) {
        if self.flags.get(key).is_none() {
            return;
        }
        info!(key, "removing flag");
        self.flags.remove(key);
        self.persist();
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.flags.entries()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested/flags.json"));
        (dir, store)
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("promo-decline"), None);
        store.set("promo-decline", "1700000000.5");
        assert_eq!(store.get("promo-decline").as_deref(), Some("1700000000.5"));
        store.remove("promo-decline");
        assert_eq!(store.get("promo-decline"), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let (_dir, store) = temp_store();
        store.set("promo-add", "1700000000");
        store.set("promo-decline", "1700000100");
        store.remove("promo-add");

        let reopened = FileStore::open(store.path());
        assert_eq!(reopened.entries(), vec![(
            "promo-decline".to_string(),
            "1700000100".to_string()
        )]);
    }

    #[test]
    fn corrupt_file_starts_empty_and_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.entries().is_empty());
        store.set("k", "1");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"k\": \"1\""));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = temp_store();
        store.set("k", "1");
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
