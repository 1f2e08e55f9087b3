use crate::error::AppError;
use crate::model::DisplayOptions;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const HISTORY_KEY: &str = "history";
pub const FAVORITES_KEY: &str = "favorites";
pub const OPTIONS_KEY: &str = "options";
pub const HISTORY_LIMIT: usize = 5;

/// Durable string-keyed mapping. Values are serialized JSON documents.
///
/// Implementations swallow their own I/O failures: a failed write is logged
/// and dropped, a failed read looks like a missing key.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// Volatile store for tests and headless embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, raw: &str) -> Self {
        self.entries.insert(key.to_string(), raw.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// One `<key>.json` file per key under a data directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(path = %root.display(), "opened directory store");
        Ok(Self { root })
    }

    /// `<platform data dir>/nexapedia`, falling back to the working directory.
    pub fn default_location() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexapedia")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for DirectoryStore {
    fn read(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, error = %err, "failed to read stored value");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(err) = fs::write(self.path_for(key), value) {
            warn!(key, error = %err, "failed to write stored value");
        }
    }

    fn remove(&mut self, key: &str) {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(key, error = %err, "failed to remove stored value"),
        }
    }
}

/// Typed accessor over a [`KeyValueStore`] holding history, favorites and
/// display options.
#[derive(Debug, Clone)]
pub struct PersistentStore<S> {
    backend: S,
}

impl<S: KeyValueStore> PersistentStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let Some(raw) = self.backend.read(key) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| AppError::StorageCorrupt {
                key: key.to_string(),
                message: err.to_string(),
            })
    }

    /// Returns the stored value, or `default` when it is missing or corrupt.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(error = %err, "falling back to default");
                default
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.write(key, &raw),
            Err(err) => warn!(key, error = %err, "failed to serialize value"),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.get(HISTORY_KEY, Vec::new())
    }

    pub fn favorites(&self) -> Vec<String> {
        self.get(FAVORITES_KEY, Vec::new())
    }

    pub fn is_favorite(&self, query: &str) -> bool {
        self.favorites().iter().any(|item| item == query)
    }

    /// Moves `query` to the front of the history, evicting past the limit.
    pub fn add_history(&mut self, query: &str) -> Vec<String> {
        let mut history = self.history();
        history.retain(|item| item != query);
        history.insert(0, query.to_string());
        history.truncate(HISTORY_LIMIT);
        self.set(HISTORY_KEY, &history);
        history
    }

    /// Adds `query` to the favorites, or removes it when already present.
    /// Returns whether it is a favorite afterwards.
    pub fn toggle_favorite(&mut self, query: &str) -> bool {
        let mut favorites = self.favorites();
        let now_favorite = if favorites.iter().any(|item| item == query) {
            favorites.retain(|item| item != query);
            false
        } else {
            favorites.push(query.to_string());
            true
        };
        self.set(FAVORITES_KEY, &favorites);
        now_favorite
    }

    pub fn remove_favorite(&mut self, query: &str) {
        let mut favorites = self.favorites();
        favorites.retain(|item| item != query);
        self.set(FAVORITES_KEY, &favorites);
    }

    pub fn save_options(&mut self, options: &DisplayOptions) {
        self.set(OPTIONS_KEY, options);
    }

    /// Loads the options, discarding a corrupt record so the next load
    /// starts clean.
    pub fn load_options(&mut self) -> DisplayOptions {
        match self.read::<DisplayOptions>(OPTIONS_KEY) {
            Ok(Some(options)) => options,
            Ok(None) => DisplayOptions::default(),
            Err(err) => {
                warn!(error = %err, "discarding stored options");
                self.backend.remove(OPTIONS_KEY);
                DisplayOptions::default()
            }
        }
    }
}
