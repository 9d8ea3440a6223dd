//! Durable storage for the [`PersistedState`] document.
//!
//! The document lives in a single JSON file. Updates are written to a
//! uniquely named temporary file in the same directory, flushed to disk and
//! renamed over the canonical path, so a reader sees either the previous
//! document or the new one and never a partially written file.
//!
//! Writers serialize on an advisory lock held on `<path>.lock`, which also
//! covers handles opened by other processes (the admin CLI next to a running
//! front end). Read-modify-write cycles go through
//! [`StateManager::mutate`](crate::state::StateManager::mutate), which takes
//! that lock.

use crate::models::PersistedState;
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use thiserror::Error;

/// Errors raised by the store and the mutation coordinator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file exists but could not be read or written.
    #[error("state store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file does not contain a valid document.
    #[error("malformed state document at {path}: {source}")]
    MalformedDocument {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize state document: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Exclusive writer lock on a store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

/// File-backed store for the persisted document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Utf8PathBuf,
    lock_path: Utf8PathBuf,
    seed_public_enabled: bool,
}

impl StateStore {
    /// Open the store at `path`, creating parent directories and the default
    /// document if it does not exist yet.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        Self::open_seeded(path, true)
    }

    /// Like [`open`](Self::open), but a newly created document starts with
    /// `public_enabled` set to `seed_public_enabled`.
    ///
    /// The seed is ignored when the document already exists.
    pub fn open_seeded<P: AsRef<Utf8Path>>(path: P, seed_public_enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = Utf8PathBuf::from(format!("{}.lock", path));

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::StoreUnavailable {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let store = Self {
            path,
            lock_path,
            seed_public_enabled,
        };

        // Surface a corrupt or unreadable document at startup rather than on
        // the first request.
        store.load()?;

        Ok(store)
    }

    /// Canonical location of the document.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Block until this handle holds the writer lock.
    pub fn lock(&self) -> Result<StoreLock> {
        let unavailable = |source| StoreError::StoreUnavailable {
            path: self.lock_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(unavailable)?;
        file.lock_exclusive().map_err(unavailable)?;

        Ok(StoreLock { _file: file })
    }

    /// Read the current document, creating the default one on first use.
    pub fn load(&self) -> Result<PersistedState> {
        if let Some(state) = self.read_document()? {
            return Ok(state);
        }
        let _lock = self.lock()?;
        self.load_locked()
    }

    /// [`load`](Self::load) for a caller that already holds [`lock`](Self::lock).
    pub fn load_locked(&self) -> Result<PersistedState> {
        if let Some(state) = self.read_document()? {
            return Ok(state);
        }

        let state = PersistedState::seeded(self.seed_public_enabled);
        self.save(&state)?;
        tracing::info!(
            "Created state document at {} (public_enabled={})",
            self.path,
            state.config.public_enabled
        );
        Ok(state)
    }

    /// Persist `state`, replacing the current document atomically.
    ///
    /// Callers other than the first-run path must hold [`lock`](Self::lock).
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let mut encoded = serde_json::to_vec_pretty(state)?;
        encoded.push(b'\n');

        self.replace_with(&encoded).map_err(|source| {
            tracing::error!("Failed to persist state document {}: {}", self.path, source);
            StoreError::StoreUnavailable {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// `None` when no document exists yet.
    fn read_document(&self) -> Result<Option<PersistedState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                tracing::error!("Failed to read state document {}: {}", self.path, source);
                return Err(StoreError::StoreUnavailable {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        parse_document(&bytes).map(Some).map_err(|source| {
            tracing::error!("State document {} is malformed: {}", self.path, source);
            StoreError::MalformedDocument {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn replace_with(&self, encoded: &[u8]) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        let prefix = format!(".{}.", self.path.file_name().unwrap_or("state"));

        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        sync_dir(dir)
    }
}

/// Decode a document, rejecting anything whose sections are not JSON objects.
///
/// serde accepts a sequence for a struct and fills the missing fields with
/// their defaults, so `[]` would otherwise load as a fresh document.
fn parse_document(bytes: &[u8]) -> serde_json::Result<PersistedState> {
    let value: Value = serde_json::from_slice(bytes)?;
    check_shape(&value).map_err(<serde_json::Error as serde::de::Error>::custom)?;
    serde_json::from_value(value)
}

fn check_shape(value: &Value) -> std::result::Result<(), String> {
    let root = value
        .as_object()
        .ok_or_else(|| format!("expected an object at the top level, found {}", kind(value)))?;

    for section in ["config", "stats"] {
        if let Some(v) = root.get(section).filter(|v| !v.is_object()) {
            return Err(format!("expected `{}` to be an object, found {}", section, kind(v)));
        }
    }

    let stats = root.get("stats").and_then(Value::as_object);
    for key in ["per_identity", "per_user"] {
        let Some(table) = stats.and_then(|s| s.get(key)) else {
            continue;
        };
        let entries = table
            .as_object()
            .ok_or_else(|| format!("expected `stats.{}` to be an object, found {}", key, kind(table)))?;
        if let Some((id, v)) = entries.iter().find(|(_, v)| !v.is_object()) {
            return Err(format!("expected `stats.{}.{}` to be an object, found {}", key, id, kind(v)));
        }
    }

    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Utf8Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Utf8Path) -> io::Result<()> {
    Ok(())
}
