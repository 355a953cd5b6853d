use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::state::{AppState, LoadReport, PersistedState};

pub const DEFAULT_STORAGE_KEY: &str = "steady-state";

/// Synchronous key-value medium the state is persisted to. No transactions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
}

pub fn validate_key(key: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if key.is_empty() || key.starts_with('.') || !key.chars().all(allowed) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.entries.write().insert(key.to_string(), value.into());
        store
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One JSON file per key under `root`, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(root))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        info!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        temp.write_all(value).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.persist(&path).map_err(|err| StoreError::Persist {
            path: path.clone(),
            source: err.error,
        })?;
        debug!(file = %path.display(), bytes = value.len(), "wrote state file");
        Ok(())
    }
}

/// What [`StateStore::load`] found in the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    pub state: AppState,
    pub report: LoadReport,
    /// The stored record was absent or unparsable.
    pub fresh: bool,
}

/// Load/save boundary for the application state under one well-known key.
pub struct StateStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl StateStore {
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self { backend, key })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Result<LoadedState> {
        self.load_in(&Local)
    }

    /// A missing or unparsable record yields a fresh default state. A failed
    /// read is returned as an error so nothing is saved over a record that
    /// could not be seen. Legacy dates are migrated relative to `tz` and
    /// written back once.
    #[tracing::instrument(skip(self, tz), fields(key = %self.key))]
    pub fn load_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<LoadedState> {
        let Some(bytes) = self.backend.get(&self.key)? else {
            debug!("no stored state, starting fresh");
            return Ok(Self::fresh());
        };
        let persisted: PersistedState = match serde_json::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(%err, "stored state malformed, starting fresh");
                return Ok(Self::fresh());
            }
        };
        let (state, report) = persisted.into_state(tz);
        if report.migrated_fields > 0 {
            info!(fields = report.migrated_fields, "migrated legacy date keys");
            if let Err(err) = self.save(&state) {
                warn!(%err, "failed to write back migrated state");
            }
        }
        debug!(
            tasks = state.tasks.len(),
            skipped = report.skipped_records,
            "loaded state"
        );
        Ok(LoadedState {
            state,
            report,
            fresh: false,
        })
    }

    #[tracing::instrument(skip(self, state), fields(key = %self.key, tasks = state.tasks.len()))]
    pub fn save(&self, state: &AppState) -> Result<()> {
        let encoded = serde_json::to_vec(&PersistedState::from(state))?;
        self.backend.set(&self.key, &encoded)
    }

    fn fresh() -> LoadedState {
        LoadedState {
            state: AppState::default(),
            report: LoadReport::default(),
            fresh: true,
        }
    }
}
