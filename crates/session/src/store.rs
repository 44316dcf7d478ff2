// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key/value storage for session secrets.
//!
//! The store knows nothing about the protocol: get/set/delete per key,
//! atomic per operation, durable across process restarts. No ordering is
//! guaranteed across different keys — callers needing multi-key
//! consistency go through [`persist_credentials`] and
//! [`clear_credentials`], which order writes around the identity
//! credential (its presence is what marks "a session exists").

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Keys the session core persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    IdToken,
    RefreshToken,
    /// Code verifier of the in-flight interactive sign-in attempt.
    PendingVerifier,
}

impl CredentialKey {
    /// Stable storage name for this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
            Self::PendingVerifier => "pending_verifier",
        }
    }
}

/// Secret store contract: get/set/delete, each operation atomic per key
/// and safe to call concurrently with itself.
///
/// A failing medium surfaces as [`AuthError::Storage`]; callers must not
/// assume partial multi-key writes were rolled back.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError>;
    fn set(&self, key: CredentialKey, value: &str) -> Result<(), AuthError>;
    fn delete(&self, key: CredentialKey) -> Result<(), AuthError>;
}

/// The credential triple issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Persist a credential set.
///
/// The identity credential is written last: downstream logic treats its
/// presence/validity as "a session exists", so an interrupted write must
/// not leave a session marker without the credentials behind it.
pub fn persist_credentials(
    store: &dyn CredentialStore,
    set: &CredentialSet,
) -> Result<(), AuthError> {
    store.set(CredentialKey::AccessToken, &set.access_token)?;
    if let Some(ref refresh) = set.refresh_token {
        store.set(CredentialKey::RefreshToken, refresh)?;
    }
    store.set(CredentialKey::IdToken, &set.id_token)?;
    Ok(())
}

/// Load the persisted credential set.
///
/// Returns `None` unless the identity credential is present — a partial
/// set without it is not a session.
pub fn load_credentials(store: &dyn CredentialStore) -> Result<Option<CredentialSet>, AuthError> {
    let Some(id_token) = store.get(CredentialKey::IdToken)? else {
        return Ok(None);
    };
    let Some(access_token) = store.get(CredentialKey::AccessToken)? else {
        return Ok(None);
    };
    let refresh_token = store.get(CredentialKey::RefreshToken)?;
    Ok(Some(CredentialSet { access_token, id_token, refresh_token }))
}

/// Delete all three credentials. The identity credential goes first so
/// the session marker disappears before its backing credentials.
pub fn clear_credentials(store: &dyn CredentialStore) -> Result<(), AuthError> {
    store.delete(CredentialKey::IdToken)?;
    store.delete(CredentialKey::AccessToken)?;
    store.delete(CredentialKey::RefreshToken)?;
    Ok(())
}

/// Resolve the state directory for session data.
///
/// Checks `SOUQ_STATE_DIR`, then `$XDG_STATE_HOME/souq`, then
/// `$HOME/.local/state/souq`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SOUQ_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("souq");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/souq");
    }
    PathBuf::from(".souq")
}

/// Persisted JSON shape of the file store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSecrets {
    #[serde(default)]
    secrets: HashMap<String, String>,
}

/// File-backed store: one JSON map, written atomically (unique tmp name,
/// then rename), 0o600 on unix. An interior lock serializes the
/// read-modify-write of each operation.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    /// File store at `state_dir()/session.json`.
    pub fn at_default_location() -> Self {
        Self::new(state_dir().join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };
        let persisted: PersistedSecrets =
            serde_json::from_str(&contents).map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(persisted.secrets)
    }

    /// Write the map atomically: unique temp filename (PID + counter) to
    /// avoid corruption when concurrent saves race on the same `.tmp`
    /// file, then rename over the target.
    fn write_map(&self, secrets: HashMap<String, String>) -> Result<(), AuthError> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| AuthError::Storage(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(&PersistedSecrets { secrets })
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json).map_err(|e| AuthError::Storage(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&tmp_path, perms);
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| AuthError::Storage(e.to_string()))
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.get(key.as_str()).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), AuthError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        let _ = map.insert(key.as_str().to_owned(), value.to_owned());
        self.write_map(map)
    }

    fn delete(&self, key: CredentialKey) -> Result<(), AuthError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key.as_str()).is_none() {
            return Ok(());
        }
        self.write_map(map)
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<CredentialKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        Ok(self.map.lock().get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), AuthError> {
        let _ = self.map.lock().insert(key, value.to_owned());
        Ok(())
    }

    fn delete(&self, key: CredentialKey) -> Result<(), AuthError> {
        let _ = self.map.lock().remove(&key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
