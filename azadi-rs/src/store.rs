//! Key-value settings store.
//!
//! Everything the server persists lives here under three well-known keys:
//! the upstream DoH address, the password record, and the session token.
//! The store is injected into the HTTP layer as `Arc<dyn SettingsStore>` so
//! tests can substitute [`MemoryStore`].
//!
//! Writes are last-write-wins; there is no compare-and-swap. Two concurrent
//! writes to the same key race at the store level, matching the single-writer
//! deployments this server targets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;

/// Persisted upstream DoH URL.
pub const KEY_UPSTREAM: &str = "dohaddress";
/// Salted password record, absent until first-time setup.
pub const KEY_PASSWORD: &str = "password";
/// Current session token; at most one session is active.
pub const KEY_SESSION: &str = "sessionToken";

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("settings store unavailable")]
    Unavailable,
}

/// Asynchronous, fallible string key-value store.
///
/// `get` returns `Ok(None)` for absent keys; `delete` of an absent key is a
/// no-op.
pub trait SettingsStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;
    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Settings persisted as a flat TOML table in `<data_dir>/settings.toml`.
///
/// The whole map is rewritten on every mutation while the write lock is held,
/// so the file never interleaves concurrent writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the settings file under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|source| StoreError::CreateDir {
            path: data_dir.display().to_string(),
            source,
        })?;

        let path = data_dir.join(SETTINGS_FILE);
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw).map_err(|source| StoreError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let rendered = toml::to_string_pretty(entries).map_err(|err| StoreError::Write {
            path: self.path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })?;

        tokio::fs::write(&self.path, rendered)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.display().to_string(),
                source,
            })
    }
}

impl SettingsStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async move { Ok(self.entries.read().await.get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), value.to_string());
            self.persist(&entries).await
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            if entries.remove(key).is_none() {
                return Ok(());
            }
            self.persist(&entries).await
        })
    }
}

/// In-memory store for tests and ephemeral deployments.
///
/// `fail_writes` makes every `put`/`delete` return [`StoreError::Unavailable`]
/// so error paths can be exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn writes_failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

impl SettingsStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async move { Ok(self.entries.get(key).map(|entry| entry.value().clone())) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.writes_failing() {
                return Err(StoreError::Unavailable);
            }
            self.entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.writes_failing() {
                return Err(StoreError::Unavailable);
            }
            self.entries.remove(key);
            Ok(())
        })
    }
}
