use crate::archive::format::{
    read_u32, CompressionKind, Entry, PakHeader, MIN_SEALED_LEN, NONCE_LEN,
};
use crate::error::{PakError, Result};
use crate::keys::{KeyProvider, KEY_LEN};
use crate::source::{fold_folder, fold_path, ContentSource};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Content source backed by one on-disk package.
///
/// The full TOC is parsed into a path→entry map once, at open time. Reads
/// are served as bounded slices of the archive file with on-demand
/// decompression; encrypted entries are opened eagerly into memory so no
/// unauthenticated plaintext ever escapes.
pub struct ArchiveSource {
    file: Arc<Mutex<File>>,
    version: u16,
    entries: HashMap<String, Entry>,
    keys: Option<Arc<dyn KeyProvider>>,
}

impl ArchiveSource {
    /// Open an archive without key material; encrypted entries will fail
    /// with a cryptographic error.
    pub fn open_archive<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_archive_with_keys(path, None)
    }

    /// Open an archive, optionally with a key provider for encrypted
    /// entries.
    pub fn open_archive_with_keys<P: AsRef<Path>>(
        path: P,
        keys: Option<Arc<dyn KeyProvider>>,
    ) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len();

        let header = PakHeader::read_from(&mut file)?;
        header.validate_version()?;

        let count = read_u32(&mut file)? as usize;
        let mut entries = HashMap::with_capacity(count);

        for _ in 0..count {
            let entry = Entry::read_from(&mut file, header.version)?;

            if entry.offset.checked_add(entry.stored).is_none()
                || entry.offset + entry.stored > file_len
            {
                return Err(PakError::Format(format!(
                    "entry {} extends past end of archive",
                    entry.path
                )));
            }

            let key = fold_path(&entry.path);
            if entries.insert(key, entry).is_some() {
                return Err(PakError::Format(
                    "duplicate logical path in TOC".to_string(),
                ));
            }
        }

        debug!(
            path = %path.as_ref().display(),
            version = header.version,
            entries = entries.len(),
            "opened archive source"
        );

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            version: header.version,
            entries,
            keys,
        })
    }

    /// On-disk format version of this archive.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Number of entries in the TOC.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// TOC entry for a logical path, if present.
    pub fn get_entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(&fold_path(path))
    }

    /// All TOC entries, sorted by path for deterministic output.
    pub fn entries(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Decrypt a sealed payload into its (possibly still compressed)
    /// plaintext.
    fn decrypt_entry(&self, entry: &Entry) -> Result<Vec<u8>> {
        let provider = self.keys.as_ref().ok_or_else(|| {
            PakError::Crypto(format!("no key available to decrypt {}", entry.path))
        })?;
        let key = provider.key().ok_or_else(|| {
            PakError::Crypto(format!("key unavailable, cannot decrypt {}", entry.path))
        })?;
        if key.len() != KEY_LEN {
            return Err(PakError::Crypto(format!(
                "decryption key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        if entry.stored < MIN_SEALED_LEN {
            return Err(PakError::Crypto(format!(
                "sealed payload for {} is too short",
                entry.path
            )));
        }

        // One lock acquisition covers seek + read, so concurrent opens
        // cannot interleave on the shared cursor.
        let sealed = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(entry.offset))?;
            let mut buf = vec![0u8; entry.stored as usize];
            file.read_exact(&mut buf)?;
            buf
        };

        let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| PakError::Crypto("invalid key length".to_string()))?;

        let aad = entry.aad();
        let plaintext = cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed[NONCE_LEN..],
                    aad: &aad,
                },
            )
            .map_err(|_| {
                PakError::Crypto(format!("authentication failed for {}", entry.path))
            })?;

        // For uncompressed entries the plaintext is the final content and
        // must match the recorded original size exactly.
        if entry.compression == CompressionKind::None
            && plaintext.len() as u64 != entry.original
        {
            return Err(PakError::Crypto(format!(
                "decrypted length mismatch for {}",
                entry.path
            )));
        }

        Ok(plaintext)
    }
}

impl ContentSource for ArchiveSource {
    fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(&fold_path(path))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let entry = self
            .get_entry(path)
            .ok_or_else(|| PakError::NotFound(path.to_string()))?;

        let inner: Box<dyn Read + Send> = if entry.encrypted {
            Box::new(Cursor::new(self.decrypt_entry(entry)?))
        } else {
            Box::new(SliceReader::new(
                Arc::clone(&self.file),
                entry.offset,
                entry.stored,
            ))
        };

        Ok(wrap_decompressor(inner, entry.compression))
    }

    fn list(&self, folder: &str) -> Result<Vec<String>> {
        let prefix = fold_folder(folder);
        let mut paths: Vec<String> = self
            .entries
            .values()
            .filter(|entry| fold_path(&entry.path).starts_with(&prefix))
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Wrap a raw payload reader in the streaming decompressor matching its
/// compression kind.
fn wrap_decompressor(
    reader: Box<dyn Read + Send>,
    kind: CompressionKind,
) -> Box<dyn Read + Send> {
    match kind {
        CompressionKind::None => reader,
        CompressionKind::Brotli => Box::new(brotli::Decompressor::new(reader, 4096)),
        CompressionKind::Deflate => Box::new(flate2::read::DeflateDecoder::new(reader)),
    }
}

/// Bounded view of `[offset, offset + len)` within the shared archive file.
///
/// Each read locks the file, seeks, and reads as one atomic unit, so slices
/// over different entries can be consumed concurrently.
struct SliceReader {
    file: Arc<Mutex<File>>,
    position: u64,
    end: u64,
}

impl SliceReader {
    fn new(file: Arc<Mutex<File>>, offset: u64, len: u64) -> Self {
        Self {
            file,
            position: offset,
            end: offset + len,
        }
    }
}

impl Read for SliceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = (self.end - self.position) as usize;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(remaining);
        let read = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.position))?;
            file.read(&mut buf[..want])?
        };
        self.position += read as u64;
        Ok(read)
    }
}
