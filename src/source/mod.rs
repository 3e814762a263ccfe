//! Content resolution: the `ContentSource` capability and its concrete
//! variants.
//!
//! The engine reads everything through this trait; whether a logical path is
//! served by a loose file on disk or by an entry inside a package is
//! invisible to the caller.

pub mod composite;
pub mod filesystem;

pub use composite::CompositeSource;
pub use filesystem::FilesystemSource;

use crate::error::Result;
use std::io::Read;

/// Capability contract shared by all content sources.
///
/// Logical paths use forward slashes, carry no leading slash, and match
/// case-insensitively. `list` re-scans on every call.
pub trait ContentSource: Send + Sync {
    /// Check whether a logical path can be served by this source.
    fn exists(&self, path: &str) -> bool;

    /// Open a readable byte stream for a logical path.
    ///
    /// Fails with [`PakError::NotFound`](crate::PakError::NotFound) if the
    /// path is absent.
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Enumerate logical paths under a folder prefix ("" lists everything).
    fn list(&self, folder: &str) -> Result<Vec<String>>;
}

/// Normalize a logical path: forward slashes, no leading slash.
pub(crate) fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    forward.trim_start_matches('/').to_string()
}

/// Case-folded key form of a logical path, used for lookups.
pub(crate) fn fold_path(path: &str) -> String {
    normalize_path(path).to_lowercase()
}

/// Case-folded folder prefix with a guaranteed trailing slash ("" stays "").
pub(crate) fn fold_folder(folder: &str) -> String {
    let mut prefix = fold_path(folder);
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}
