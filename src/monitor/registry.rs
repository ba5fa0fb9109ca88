//! Root and tailer bookkeeping for the monitor.
//!
//! One lock guards both maps so that teardown of a root and lazy creation of
//! a tailer under it cannot interleave.

use std::collections::{BTreeSet, HashMap, hash_map::Entry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::tailer::FileTailer;

/// A tailer shared between the registry and the event loop.
pub type SharedTailer = Arc<Mutex<FileTailer>>;

#[derive(Default)]
struct Inner {
    /// Observed root -> concrete files seen changing under it.
    roots: HashMap<PathBuf, BTreeSet<PathBuf>>,
    /// Concrete file -> live tailer.
    files: HashMap<PathBuf, SharedTailer>,
}

/// Synchronized map of observed roots and their file tailers.
#[derive(Default)]
pub struct TailerRegistry {
    inner: RwLock<Inner>,
}

impl TailerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `root`. Returns `false` if it was already tracked.
    pub fn add_root(&self, root: PathBuf) -> bool {
        match self.inner.write().roots.entry(root) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(BTreeSet::new());
                true
            }
        }
    }

    pub fn contains_root(&self, root: &Path) -> bool {
        self.inner.read().roots.contains_key(root)
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.inner.read().roots.keys().cloned().collect()
    }

    /// Concrete files recorded under `root`.
    pub fn children(&self, root: &Path) -> Vec<PathBuf> {
        self.inner
            .read()
            .roots
            .get(root)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, path: &Path) -> Option<SharedTailer> {
        self.inner.read().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Return the tailer for `path`, creating it under `root` if absent.
    ///
    /// Returns `None` if `root` is no longer tracked. Creation happens in a
    /// single exclusive section, so two events for the same new path always
    /// end up with the same tailer.
    pub fn get_or_create(
        &self,
        root: &Path,
        path: &Path,
        make: impl FnOnce() -> FileTailer,
    ) -> Option<SharedTailer> {
        {
            let inner = self.inner.read();
            if !inner.roots.contains_key(root) {
                return None;
            }
            if let Some(tailer) = inner.files.get(path) {
                return Some(tailer.clone());
            }
        }

        let mut inner = self.inner.write();
        let children = inner.roots.get_mut(root)?;
        children.insert(path.to_path_buf());

        let tailer = match inner.files.entry(path.to_path_buf()) {
            Entry::Occupied(slot) => slot.get().clone(),
            Entry::Vacant(slot) => {
                crate::debug_event!("monitor", "new tailer", "{}", path.display());
                slot.insert(Arc::new(Mutex::new(make()))).clone()
            }
        };
        Some(tailer)
    }

    /// Drop `tailer` from the file map if it is still the live instance.
    pub fn retire(&self, path: &Path, tailer: &SharedTailer) -> bool {
        let mut inner = self.inner.write();
        match inner.files.get(path) {
            Some(current) if Arc::ptr_eq(current, tailer) => {
                inner.files.remove(path);
                true
            }
            _ => false,
        }
    }

    /// Forget `root` and every tailer under it, then close those tailers.
    ///
    /// Tailers are closed after the registry lock is released, so a tailer
    /// busy with an event only delays this call. The caller must not already
    /// hold one of the tailers (a sender running on the event loop does).
    ///
    /// Returns the number of tailers closed, or `None` if `root` was not
    /// tracked.
    pub fn remove_root(&self, root: &Path) -> Option<usize> {
        let removed: Vec<SharedTailer> = {
            let mut inner = self.inner.write();
            let children = inner.roots.remove(root)?;
            children
                .iter()
                .filter_map(|child| inner.files.remove(child))
                .collect()
        };

        for tailer in &removed {
            tailer.lock().close();
        }
        Some(removed.len())
    }
}
