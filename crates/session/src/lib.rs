//! Session-scoped key/value storage and typed JSON snapshots.
//!
//! State lives for the browsing session only (the tab's `sessionStorage` in
//! the browser) and is never encoded into the page URL, so several embedded
//! copies of the dashboard do not share state.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session storage unavailable")]
    Unavailable,
    #[error("session storage error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("snapshot is corrupt: {0}")]
    Corrupt(String),
    #[error("snapshot could not be encoded: {0}")]
    Encode(String),
}

pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns `true` if the key existed.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;
}

/// Process-local store. Cloning copies the entries, so a clone behaves like
/// a second tab that inherited this session.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    entries: BTreeMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Storage key for a snapshot schema.
///
/// The key embeds the schema version and a short BLAKE3 fingerprint of the
/// layout the snapshot refers to, so a schema or layout change reads back as
/// "absent" instead of being misparsed.
pub fn snapshot_key(prefix: &str, schema_version: u32, layout: &[u8]) -> String {
    let hash = blake3::hash(layout).to_hex();
    format!("{prefix}.v{schema_version}.{}", &hash.as_str()[..12])
}

/// A single JSON-encoded value stored under one key.
#[derive(Debug, Clone)]
pub struct SnapshotSlot<T> {
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> SnapshotSlot<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn try_save<S: SessionStore + ?Sized>(
        &self,
        store: &mut S,
        value: &T,
    ) -> Result<(), SnapshotError> {
        let raw = serde_json::to_string(value).map_err(|e| SnapshotError::Encode(e.to_string()))?;
        store.set(&self.key, &raw)?;
        Ok(())
    }

    /// Persists `value`; failures are logged and reported as `false`.
    pub fn save<S: SessionStore + ?Sized>(&self, store: &mut S, value: &T) -> bool {
        match self.try_save(store, value) {
            Ok(()) => {
                debug!(key = %self.key, "snapshot saved");
                true
            }
            Err(err) => {
                warn!(key = %self.key, "snapshot not saved: {err}");
                false
            }
        }
    }

    pub fn try_load<S: SessionStore + ?Sized>(&self, store: &S) -> Result<Option<T>, SnapshotError> {
        let Some(raw) = store.get(&self.key)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<T>(&raw)
            .map(Some)
            .map_err(|e| SnapshotError::Corrupt(e.to_string()))
    }

    /// Missing, unreadable and corrupt snapshots all read as `None`.
    pub fn load<S: SessionStore + ?Sized>(&self, store: &S) -> Option<T> {
        match self.try_load(store) {
            Ok(v) => v,
            Err(err) => {
                warn!(key = %self.key, "ignoring stored snapshot: {err}");
                None
            }
        }
    }

    pub fn clear<S: SessionStore + ?Sized>(&self, store: &mut S) {
        if let Err(err) = store.remove(&self.key) {
            warn!(key = %self.key, "snapshot not cleared: {err}");
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{SessionStore, StoreError};

    /// `window.sessionStorage`, optionally namespaced.
    #[derive(Debug)]
    pub struct SessionStorageStore {
        namespace: String,
    }

    impl SessionStorageStore {
        pub fn new(namespace: impl Into<String>) -> Result<Self, StoreError> {
            // Fail early if storage is blocked (e.g. sandboxed iframes).
            window_session_storage()?;
            Ok(Self {
                namespace: namespace.into(),
            })
        }

        fn full_key(&self, key: &str) -> String {
            if self.namespace.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", self.namespace, key)
            }
        }
    }

    impl SessionStore for SessionStorageStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            window_session_storage()?
                .get_item(&self.full_key(key))
                .map_err(|e| StoreError::Io(format!("get_item failed: {:?}", e)))
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            window_session_storage()?
                .set_item(&self.full_key(key), value)
                .map_err(|e| StoreError::Io(format!("set_item failed: {:?}", e)))
        }

        fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
            let storage = window_session_storage()?;
            let full = self.full_key(key);
            let existed = storage
                .get_item(&full)
                .map_err(|e| StoreError::Io(format!("get_item failed: {:?}", e)))?
                .is_some();
            storage
                .remove_item(&full)
                .map_err(|e| StoreError::Io(format!("remove_item failed: {:?}", e)))?;
            Ok(existed)
        }
    }

    fn window_session_storage() -> Result<web_sys::Storage, StoreError> {
        let win = web_sys::window().ok_or(StoreError::Unavailable)?;
        win.session_storage()
            .map_err(|e| StoreError::Io(format!("sessionStorage error: {:?}", e)))?
            .ok_or(StoreError::Unavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::SessionStorageStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct SessionStorageStore;

#[cfg(not(target_arch = "wasm32"))]
impl SessionStorageStore {
    pub fn new(_namespace: impl Into<String>) -> Result<Self, StoreError> {
        Err(StoreError::Unavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SessionStore for SessionStorageStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn remove(&mut self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        InMemorySessionStore, SessionStorageStore, SessionStore, SnapshotError, SnapshotSlot,
        StoreError, snapshot_key,
    };
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snap {
        theme: String,
        checked: Vec<String>,
    }

    fn snap() -> Snap {
        Snap {
            theme: "governance".to_string(),
            checked: vec!["eezToggle".to_string()],
        }
    }

    #[test]
    fn save_then_load() {
        let mut store = InMemorySessionStore::new();
        let slot = SnapshotSlot::<Snap>::new("k");
        assert!(slot.save(&mut store, &snap()));
        assert_eq!(slot.load(&store), Some(snap()));

        slot.clear(&mut store);
        assert_eq!(slot.load(&store), None);
        assert!(store.is_empty());
    }

    #[test]
    fn clones_do_not_share_entries() {
        let mut store = InMemorySessionStore::new();
        let slot = SnapshotSlot::<Snap>::new("k");
        assert!(slot.save(&mut store, &snap()));

        let mut copy = store.clone();
        assert_eq!(slot.load(&copy), Some(snap()));
        copy.set("other", "1").unwrap();
        slot.clear(&mut copy);
        assert_eq!(slot.load(&store), Some(snap()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn corrupt_or_mismatched_payload_reads_as_absent() {
        let mut store = InMemorySessionStore::new();
        let slot = SnapshotSlot::<Snap>::new("k");

        store.set("k", "{ not json").unwrap();
        assert!(matches!(slot.try_load(&store), Err(SnapshotError::Corrupt(_))));
        assert_eq!(slot.load(&store), None);

        store.set("k", r#"{"theme": 3}"#).unwrap();
        assert_eq!(slot.load(&store), None);

        store.set("k", "  ").unwrap();
        assert_eq!(slot.load(&store), None);
    }

    #[test]
    fn key_changes_with_layout_and_version() {
        let a = snapshot_key("beci", 1, b"layout-a");
        let b = snapshot_key("beci", 1, b"layout-b");
        let c = snapshot_key("beci", 2, b"layout-a");
        assert!(a.starts_with("beci.v1."));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, snapshot_key("beci", 1, b"layout-a"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn native_session_storage_is_unavailable() {
        assert!(matches!(
            SessionStorageStore::new("beci"),
            Err(StoreError::Unavailable)
        ));
        let mut store = SessionStorageStore;
        let slot = SnapshotSlot::<Snap>::new("k");
        // Saving degrades to "persist nothing".
        assert!(!slot.save(&mut store, &snap()));
        assert_eq!(slot.load(&store), None);
        assert_eq!(store.get("k"), Err(StoreError::Unavailable));
    }
}
