//! Handler registry keyed by absolute path.
//!
//! Lookup tries the exact path first, then the path's parent directory, so a
//! single directory registration receives events for every file inside it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::handler::EventHandler;

/// Thread-safe map of absolute path to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<PathBuf, Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handler` for `path` unless one is already there.
    ///
    /// Returns `false` if the path was already registered.
    pub fn insert(&self, path: PathBuf, handler: Arc<dyn EventHandler>) -> bool {
        use std::collections::hash_map::Entry;

        match self.handlers.write().entry(path) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handler);
                true
            }
        }
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.handlers.write().remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.handlers.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Resolve the handler for an event path: exact match, then parent dir.
    ///
    /// The returned handle is cloned out so the lock is released before the
    /// handler runs; handlers may register or remove paths themselves.
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn EventHandler>> {
        let handlers = self.handlers.read();
        if let Some(handler) = handlers.get(path) {
            return Some(handler.clone());
        }
        path.parent().and_then(|dir| handlers.get(dir).cloned())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("paths", &self.paths())
            .finish()
    }
}
