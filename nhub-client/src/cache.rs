//! Local registration cache.
//!
//! Remembers the last confirmed registration per name and the device token
//! they were reconciled with, so that most calls go straight to an update
//! instead of listing the hub first. One JSON document per hub path holds the
//! state across restarts; without a path the cache lives in memory only.
//!
//! Mutations only touch memory. [`RegistrationCache::snapshot`] captures the
//! state to write, and [`CacheWriter`] writes snapshots off the async runtime
//! in generation order.

use nhub_types::Registration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Format version of the persisted document.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    device_token: Option<String>,
    needs_refresh: bool,
    registrations: Vec<Registration>,
}

/// Last known registrations of one hub, keyed by name.
#[derive(Debug)]
pub struct RegistrationCache {
    path: Option<PathBuf>,
    registrations: HashMap<String, Registration>,
    last_device_token: Option<String>,
    needs_refresh: bool,
    /// Bumped on every mutation.
    generation: u64,
}

impl RegistrationCache {
    /// Creates an empty cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            registrations: HashMap::new(),
            last_device_token: None,
            needs_refresh: true,
            generation: 0,
        }
    }

    /// Opens the cache stored at `path`.
    ///
    /// A missing, unreadable or outdated file yields an empty cache that
    /// needs a refresh; it is overwritten on the next persisted change.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut cache = Self {
            path: Some(path.clone()),
            ..Self::in_memory()
        };

        match load(&path) {
            Ok(Some(persisted)) if persisted.version == CACHE_VERSION => {
                cache.last_device_token = persisted.device_token;
                cache.needs_refresh = persisted.needs_refresh;
                for registration in persisted.registrations {
                    cache
                        .registrations
                        .insert(registration.name.clone(), registration);
                }
                debug!(
                    "Loaded {} cached registrations from {:?}",
                    cache.registrations.len(),
                    path
                );
            }
            Ok(Some(persisted)) => {
                warn!(
                    "Discarding registration cache {:?} with version {} (expected {})",
                    path, persisted.version, CACHE_VERSION
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Discarding unreadable registration cache {:?}: {}", path, e);
            }
        }

        cache
    }

    /// Opens the cache for `hub_path` inside `dir`.
    pub fn open_in(dir: &Path, hub_path: &str) -> Self {
        Self::open(dir.join(Self::file_name_for(hub_path)))
    }

    /// File name used for a hub path.
    ///
    /// The stem is the percent-encoded path, so distinct hub paths never
    /// share a file.
    pub fn file_name_for(hub_path: &str) -> String {
        let stem = urlencoding::encode(hub_path.trim_matches('/'));
        format!("{stem}.registrations.json")
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached registration for `name`.
    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.registrations.get(name)
    }

    /// All cached registrations, in no particular order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Device token of the last successful reconciliation.
    pub fn last_device_token(&self) -> Option<&str> {
        self.last_device_token.as_deref()
    }

    /// Whether the cache must be rebuilt from the hub before it is trusted.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Whether registering with `device_token` must list the hub first.
    pub fn requires_refresh_for(&self, device_token: &str) -> bool {
        self.needs_refresh || self.last_device_token.as_deref() != Some(device_token)
    }

    /// Token whose registrations a refresh should list: the previous token
    /// if there is one, so registrations made with it can be migrated.
    pub fn refresh_token_for<'a>(&'a self, device_token: &'a str) -> &'a str {
        self.last_device_token.as_deref().unwrap_or(device_token)
    }

    /// Replaces the cache contents with a fresh listing from the hub and
    /// records `device_token` as current.
    pub fn refresh_finished(&mut self, device_token: &str, listed: Vec<Registration>) {
        self.registrations.clear();
        for registration in listed {
            if self.registrations.contains_key(&registration.name) {
                debug!(
                    "Ignoring duplicate registration {} for name {}",
                    registration.id, registration.name
                );
                continue;
            }
            self.registrations
                .insert(registration.name.clone(), registration);
        }
        self.last_device_token = Some(device_token.to_string());
        self.needs_refresh = false;
        self.generation += 1;
    }

    /// Stores `registration` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: &str, mut registration: Registration) {
        registration.name = name.to_string();
        self.registrations.insert(name.to_string(), registration);
        self.generation += 1;
    }

    /// Removes the entry for `name`.
    pub fn remove(&mut self, name: &str) -> Option<Registration> {
        let removed = self.registrations.remove(name);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Forgets everything, forcing a refresh on the next registration.
    pub fn clear(&mut self) {
        self.registrations.clear();
        self.last_device_token = None;
        self.needs_refresh = true;
        self.generation += 1;
    }

    /// Captures the current state for writing, or `None` for an in-memory
    /// cache.
    pub fn snapshot(&self) -> Option<CacheSnapshot> {
        let path = self.path.clone()?;
        let mut registrations: Vec<Registration> = self.registrations.values().cloned().collect();
        registrations.sort_by(|a, b| a.name.cmp(&b.name));

        Some(CacheSnapshot {
            path,
            generation: self.generation,
            persisted: PersistedCache {
                version: CACHE_VERSION,
                device_token: self.last_device_token.clone(),
                needs_refresh: self.needs_refresh,
                registrations,
            },
        })
    }
}

/// Cache state captured at one generation, ready to be written.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    path: PathBuf,
    generation: u64,
    persisted: PersistedCache,
}

impl CacheSnapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Writes the snapshot with blocking file I/O.
    pub fn write(&self) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.persisted)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

/// Writes snapshots of one cache on the blocking pool.
///
/// Writes are serialized, and a snapshot older than the last one written is
/// dropped, so concurrent callers never leave stale state on disk.
#[derive(Debug, Default)]
pub(crate) struct CacheWriter {
    written: tokio::sync::Mutex<u64>,
}

impl CacheWriter {
    /// Persists `snapshot`. Failures are logged, never returned.
    pub(crate) async fn persist(&self, snapshot: Option<CacheSnapshot>) {
        let Some(snapshot) = snapshot else {
            return;
        };
        let mut written = self.written.lock().await;
        if snapshot.generation <= *written {
            debug!(
                "Skipping cache snapshot {} (already wrote {})",
                snapshot.generation, *written
            );
            return;
        }

        let generation = snapshot.generation;
        let path = snapshot.path.clone();
        match tokio::task::spawn_blocking(move || snapshot.write()).await {
            Ok(Ok(())) => *written = generation,
            Ok(Err(e)) => warn!("Failed to persist registration cache {:?}: {}", path, e),
            Err(e) => warn!("Cache write task for {:?} did not finish: {}", path, e),
        }
    }
}

fn load(path: &Path) -> io::Result<Option<PersistedCache>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let persisted = serde_json::from_slice(&bytes)?;
    Ok(Some(persisted))
}

/// Locks a shared cache, recovering the data if a holder panicked.
pub(crate) fn lock(cache: &Mutex<RegistrationCache>) -> MutexGuard<'_, RegistrationCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
