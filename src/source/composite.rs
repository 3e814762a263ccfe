//! Priority-ordered aggregation of content sources.

use crate::error::{PakError, Result};
use crate::source::{fold_path, ContentSource};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Resolves logical paths across an ordered list of sources; the first
/// source that has a path wins.
///
/// The head of the mount list is the highest priority (patches, development
/// overrides), the tail the lowest (base content). Resolutions are memoized
/// in a path→source cache that every mount mutation invalidates.
pub struct CompositeSource {
    mounts: RwLock<Vec<Arc<dyn ContentSource>>>,
    cache: RwLock<HashMap<String, Arc<dyn ContentSource>>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Mount at the head of the list (highest priority).
    pub fn mount_first(&self, source: Arc<dyn ContentSource>) {
        let mut mounts = self.mounts.write();
        mounts.insert(0, source);
        self.cache.write().clear();
        debug!(mounted = mounts.len(), "mounted source at head");
    }

    /// Mount at the tail of the list (lowest priority).
    pub fn mount_last(&self, source: Arc<dyn ContentSource>) {
        let mut mounts = self.mounts.write();
        mounts.push(source);
        self.cache.write().clear();
        debug!(mounted = mounts.len(), "mounted source at tail");
    }

    /// Remove a previously mounted source. Returns whether it was found;
    /// the cache is invalidated only on actual removal.
    pub fn unmount(&self, source: &Arc<dyn ContentSource>) -> bool {
        let mut mounts = self.mounts.write();
        let before = mounts.len();
        mounts.retain(|mounted| !Arc::ptr_eq(mounted, source));
        let removed = mounts.len() != before;
        if removed {
            self.cache.write().clear();
            debug!(mounted = mounts.len(), "unmounted source");
        }
        removed
    }

    /// Number of mounted sources.
    pub fn mount_count(&self) -> usize {
        self.mounts.read().len()
    }

    /// Snapshot of the mount list, taken so source I/O never happens while
    /// holding the mount lock.
    fn snapshot(&self) -> Vec<Arc<dyn ContentSource>> {
        self.mounts.read().clone()
    }

    /// Find the highest-priority source serving `path`, consulting the
    /// cache first.
    fn resolve(&self, path: &str) -> Option<Arc<dyn ContentSource>> {
        let key = fold_path(path);

        if let Some(hit) = self.cache.read().get(&key) {
            return Some(Arc::clone(hit));
        }

        for source in self.snapshot() {
            if source.exists(path) {
                self.cache.write().insert(key, Arc::clone(&source));
                return Some(source);
            }
        }
        None
    }
}

impl Default for CompositeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSource for CompositeSource {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        match self.resolve(path) {
            Some(source) => source.open(path),
            None => Err(PakError::NotFound(path.to_string())),
        }
    }

    fn list(&self, folder: &str) -> Result<Vec<String>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged = Vec::new();

        for source in self.snapshot() {
            for path in source.list(folder)? {
                if seen.insert(fold_path(&path)) {
                    merged.push(path);
                }
            }
        }
        Ok(merged)
    }
}
