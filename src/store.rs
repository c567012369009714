//! Durable workspace state.
//!
//! [`WorkspaceStore`] is a thin façade over a [`KeyValueStore`]: it knows
//! the key names and the record format, nothing else.  Two backends are
//! provided: [`JsonFileStore`] (one JSON object on disk, replaced
//! atomically on every write) and [`MemoryStore`].

use crate::command::Theme;
use crate::traits::KeyValueStore;
use crate::workspace::Workspace;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const KEY_WORKSPACES: &str = "workspaces";
pub const KEY_ACTIVE_INDEX: &str = "activeIndex";
pub const KEY_THEME: &str = "theme";

/// Errors from reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Everything restored at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub workspaces: Vec<Workspace>,
    pub active_index: usize,
    pub theme: Theme,
}

/// Persistence façade with the fixed key layout.
pub struct WorkspaceStore<K: KeyValueStore> {
    kv: K,
}

impl<K: KeyValueStore> WorkspaceStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Read everything back.  Missing keys yield defaults; malformed values
    /// are logged and treated as missing.
    pub fn load(&self) -> Result<PersistedState, StoreError> {
        let workspaces = self.read_key::<Vec<Workspace>>(KEY_WORKSPACES)?.unwrap_or_default();
        let mut active_index = self.read_key::<usize>(KEY_ACTIVE_INDEX)?.unwrap_or(0);
        let theme = self.read_key::<Theme>(KEY_THEME)?.unwrap_or_default();
        if active_index >= workspaces.len() {
            active_index = workspaces.len().saturating_sub(1);
        }
        Ok(PersistedState {
            workspaces,
            active_index,
            theme,
        })
    }

    pub fn save(&mut self, workspaces: &[Workspace]) -> Result<(), StoreError> {
        let value = serde_json::to_value(workspaces)?;
        self.write_key(KEY_WORKSPACES, value)
    }

    pub fn save_active_index(&mut self, index: usize) -> Result<(), StoreError> {
        self.write_key(KEY_ACTIVE_INDEX, Value::from(index))
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<(), StoreError> {
        let value = serde_json::to_value(theme)?;
        self.write_key(KEY_THEME, value)
    }

    /// Access the backend (tests use this to inspect what was written).
    pub fn backend(&self) -> &K {
        &self.kv
    }

    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    fn read_key<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let raw = self
            .kv
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match serde_json::from_value(v) {
                Ok(t) => Ok(Some(t)),
                Err(e) => {
                    warn!("ignoring malformed {:?} in state store: {}", key, e);
                    Ok(None)
                }
            },
        }
    }

    fn write_key(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.kv
            .set(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

//  JSON file backend

/// A [`KeyValueStore`] backed by a single JSON object file.
///
/// Writes go to a temporary sibling that is then renamed over the real
/// file, so readers never observe a partially written state.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Map<String, Value>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let cache = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => return Err(StoreError::NotAnObject(path)),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no state file at {}, starting empty", path.display());
                Map::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(io)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.cache)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, text).map_err(io)?;
        std::fs::rename(&tmp, &self.path).map_err(io)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.cache.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.cache.insert(key.to_string(), value);
        self.flush()
    }
}

//  In-memory backend

/// A [`KeyValueStore`] that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = std::convert::Infallible;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), Self::Error> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }
}
