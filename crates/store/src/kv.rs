use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The persistence collaborator: a plain string-keyed store supplied by the
/// host. The engine serializes all of its state as JSON through this trait
/// and performs no locking of its own; callers serialize concurrent use.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store. The default choice for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().expect("store lock").keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner.lock().expect("store lock").remove(key);
    }
}

/// File-backed store: one JSON object per file, written through on every
/// mutation. Suitable for hosts without their own key-value storage.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let cache = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "malformed store file, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn flush(&self, cache: &HashMap<String, String>) {
        match serde_json::to_string_pretty(cache) {
            Ok(raw) => {
                if let Err(err) = std::fs::write(&self.path, raw) {
                    tracing::warn!(path = %self.path.display(), %err, "failed to write store file");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize store file"),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut cache = self.cache.lock().expect("store lock");
        cache.insert(key.to_string(), value.to_string());
        self.flush(&cache);
    }

    fn remove(&self, key: &str) {
        let mut cache = self.cache.lock().expect("store lock");
        cache.remove(key);
        self.flush(&cache);
    }
}
