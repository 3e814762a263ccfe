//! Loose-file content source rooted at a directory.

use crate::error::{PakError, Result};
use crate::source::ContentSource;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Serves logical paths from files under a configured root directory.
///
/// Any path whose resolved absolute form would land outside the root is
/// rejected with [`PakError::PathSecurity`], which covers both `..` escapes
/// and absolute-path injection.
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    /// Create a source over `root`. The root must exist; it is
    /// canonicalized once so later containment checks compare stable
    /// absolute forms.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        debug!(root = %root.display(), "opened filesystem source");
        Ok(Self { root })
    }

    /// Root directory this source serves from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical path to an absolute path under the root, rejecting
    /// anything that escapes it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let forward = path.replace('\\', "/");
        let mut resolved = self.root.clone();

        for component in Path::new(&forward).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    // Popping to (or past) the root itself is an escape.
                    if !resolved.pop() || !resolved.starts_with(&self.root) {
                        return Err(PakError::PathSecurity(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PakError::PathSecurity(path.to_string()));
                }
            }
        }

        // Containment is compared case-insensitively; the root is already
        // canonical.
        let root_fold = self.root.to_string_lossy().to_lowercase();
        let resolved_fold = resolved.to_string_lossy().to_lowercase();
        if !resolved_fold.starts_with(&root_fold) {
            return Err(PakError::PathSecurity(path.to_string()));
        }

        Ok(resolved)
    }

    /// Express an absolute path under the root as a forward-slash relative
    /// logical path.
    fn relative(&self, absolute: &Path) -> String {
        let rel = absolute.strip_prefix(&self.root).unwrap_or(absolute);
        let mut out = String::new();
        for (i, part) in rel.components().enumerate() {
            if i != 0 {
                out.push('/');
            }
            out.push_str(&part.as_os_str().to_string_lossy());
        }
        out
    }
}

impl ContentSource for FilesystemSource {
    fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(resolved) => resolved.is_file(),
            Err(_) => false,
        }
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let resolved = self.resolve(path)?;
        let file = File::open(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PakError::NotFound(path.to_string())
            } else {
                PakError::Io(e)
            }
        })?;
        Ok(Box::new(file))
    }

    fn list(&self, folder: &str) -> Result<Vec<String>> {
        let base = self.resolve(folder)?;
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&base).follow_links(false) {
            let entry = entry.map_err(|e| {
                let msg = e.to_string();
                PakError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other(msg)),
                )
            })?;
            if entry.file_type().is_file() {
                paths.push(self.relative(entry.path()));
            }
        }
        paths.sort();
        Ok(paths)
    }
}
