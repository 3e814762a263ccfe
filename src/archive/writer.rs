use crate::archive::format::{
    CompressionKind, Entry, PakHeader, HEADER_SIZE, NONCE_LEN,
};
use crate::archive::reader::ArchiveSource;
use crate::error::{PakError, Result};
use crate::keys::KeyProvider;
use crate::source::ContentSource;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default minimum savings ratio below which a compressed attempt is
/// discarded and the file stored raw. Avoids paying CPU (and the occasional
/// size increase) for already-compressed media while still winning on
/// clearly compressible assets.
pub const DEFAULT_MIN_SAVINGS: f64 = 0.03;

/// Build-time policy for one archive.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Compression to attempt per file; `None` disables compression.
    pub compression: CompressionKind,
    /// Minimum savings ratio required to keep a compressed payload.
    pub min_savings: f64,
    /// Presence enables whole-archive encryption (every entry sealed).
    pub key: Option<[u8; 32]>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            compression: CompressionKind::Brotli,
            min_savings: DEFAULT_MIN_SAVINGS,
            key: None,
        }
    }
}

/// Build an archive from a directory tree in one atomic pass.
///
/// The archive is assembled in a temporary file beside `out_file` and only
/// persisted on full success, so a failed build never leaves a
/// partially-valid package behind.
pub fn build(input_dir: &Path, out_file: &Path, options: &BuildOptions) -> Result<()> {
    let files = collect_files(input_dir)?;
    info!(
        input = %input_dir.display(),
        files = files.len(),
        compression = options.compression.label(),
        encrypted = options.key.is_some(),
        "building archive"
    );

    let mut entries: Vec<Entry> = Vec::with_capacity(files.len());
    let mut blob: Vec<u8> = Vec::new();

    for (logical, physical) in files {
        let raw = std::fs::read(&physical)?;
        let original = raw.len() as u64;

        let (body, kind) = choose_payload(raw, options)?;

        let mut entry = Entry {
            path: logical,
            offset: blob.len() as u64, // blob-relative until the TOC size is known
            stored: 0,
            original,
            compression: kind,
            encrypted: false,
        };

        let payload = match &options.key {
            Some(key) => {
                entry.encrypted = true;
                seal_payload(&entry, key, &body)?
            }
            None => body,
        };

        entry.stored = payload.len() as u64;
        debug!(
            path = %entry.path,
            stored = entry.stored,
            original = entry.original,
            kind = entry.compression.label(),
            "packed entry"
        );

        blob.extend_from_slice(&payload);
        entries.push(entry);
    }

    // Offsets become absolute once header, count, and TOC sizes are known.
    let toc_len: u64 = entries.iter().map(Entry::encoded_len).sum();
    let blob_base = HEADER_SIZE as u64 + 4 + toc_len;

    let parent = match out_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        PakHeader::new().write_to(&mut writer)?;
        writer.write_all(&(entries.len() as u32).to_le_bytes())?;
        for entry in &entries {
            let mut record = entry.clone();
            record.offset += blob_base;
            record.write_to(&mut writer)?;
        }
        writer.write_all(&blob)?;
        writer.flush()?;
    }
    temp.persist(out_file).map_err(|e| PakError::Io(e.error))?;

    info!(
        output = %out_file.display(),
        entries = entries.len(),
        bytes = blob_base + blob.len() as u64,
        "archive written"
    );
    Ok(())
}

/// Write a human-readable entry table to `sink`.
pub fn list_entries(archive: &Path, sink: &mut dyn Write) -> Result<()> {
    let source = ArchiveSource::open_archive(archive)?;
    for entry in source.entries() {
        writeln!(
            sink,
            "{:>12} {:>12} {:<8} {:<4} {}",
            entry.stored,
            entry.original,
            entry.compression.label(),
            if entry.encrypted { "enc" } else { "-" },
            entry.path
        )?;
    }
    Ok(())
}

/// Extract every entry through the full decrypt+decompress pipeline into
/// `out_dir`, creating parent directories as needed.
pub fn extract_all(
    archive: &Path,
    out_dir: &Path,
    keys: Option<Arc<dyn KeyProvider>>,
) -> Result<()> {
    let source = ArchiveSource::open_archive_with_keys(archive, keys)?;
    std::fs::create_dir_all(out_dir)?;

    for entry in source.entries() {
        let target = safe_join(out_dir, &entry.path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut reader = source.open(&entry.path)?;
        let mut file = File::create(&target)?;
        std::io::copy(&mut reader, &mut file)?;
    }

    info!(
        archive = %archive.display(),
        out = %out_dir.display(),
        entries = source.entry_count(),
        "extracted archive"
    );
    Ok(())
}

/// Best-effort integrity scan: read every entry fully and report per-entry
/// success or failure to `sink`. Returns the number of failed entries.
pub fn verify(
    archive: &Path,
    sink: &mut dyn Write,
    keys: Option<Arc<dyn KeyProvider>>,
) -> Result<usize> {
    let source = ArchiveSource::open_archive_with_keys(archive, keys)?;
    let mut failures = 0usize;

    for entry in source.entries() {
        let outcome = source.open(&entry.path).and_then(|mut reader| {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(data)
        });

        match outcome {
            Ok(data) if data.len() as u64 == entry.original => {
                writeln!(sink, "ok    {} ({} bytes)", entry.path, entry.original)?;
            }
            Ok(data) => {
                failures += 1;
                writeln!(
                    sink,
                    "FAIL  {}: length mismatch (expected {}, got {})",
                    entry.path,
                    entry.original,
                    data.len()
                )?;
            }
            Err(e) => {
                failures += 1;
                writeln!(sink, "FAIL  {}: {}", entry.path, e)?;
            }
        }
    }

    if failures > 0 {
        warn!(archive = %archive.display(), failures, "verification found failures");
    }
    Ok(failures)
}

/// Walk the input tree, yielding sorted (logical, physical) pairs.
fn collect_files(input_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(input_dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            PakError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg)),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(input_dir)
            .map_err(|_| PakError::Format(format!("file outside input: {:?}", entry.path())))?;

        let mut logical = String::new();
        for (i, part) in rel.components().enumerate() {
            if i != 0 {
                logical.push('/');
            }
            logical.push_str(&part.as_os_str().to_string_lossy());
        }
        if logical.is_empty() {
            continue;
        }

        files.push((logical, entry.path().to_path_buf()));
    }

    // Deterministic TOC ordering for reproducible builds.
    files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    for window in files.windows(2) {
        if window[0].0.eq_ignore_ascii_case(&window[1].0) {
            return Err(PakError::Format(format!(
                "duplicate logical path (case-insensitive): {}",
                window[1].0
            )));
        }
    }

    Ok(files)
}

/// Apply the requested compression and keep it only if it clears the
/// minimum savings ratio. Empty files are never compressed.
fn choose_payload(raw: Vec<u8>, options: &BuildOptions) -> Result<(Vec<u8>, CompressionKind)> {
    if options.compression == CompressionKind::None || raw.is_empty() {
        return Ok((raw, CompressionKind::None));
    }

    let compressed = compress(&raw, options.compression)?;
    let savings = 1.0 - compressed.len() as f64 / raw.len() as f64;
    if savings >= options.min_savings {
        Ok((compressed, options.compression))
    } else {
        Ok((raw, CompressionKind::None))
    }
}

fn compress(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Brotli => {
            let mut out = Vec::new();
            let mut params = brotli::enc::BrotliEncoderParams::default();
            params.quality = 5;
            brotli::BrotliCompress(&mut &data[..], &mut out, &params)?;
            Ok(out)
        }
        CompressionKind::Deflate => {
            let mut encoder = flate2::write::DeflateEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            );
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Seal a payload under AES-256-GCM with a fresh random nonce, binding the
/// entry's path, original length, and compression kind as associated data.
fn seal_payload(entry: &Entry, key: &[u8; 32], body: &[u8]) -> Result<Vec<u8>> {
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(key.into());
    let aad = entry.aad();
    let ciphertext_with_tag = cipher
        .encrypt(
            nonce,
            Payload {
                msg: body,
                aad: &aad,
            },
        )
        .map_err(|_| PakError::Crypto(format!("encryption failed for {}", entry.path)))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext_with_tag.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext_with_tag);
    Ok(payload)
}

/// Join an archive-supplied logical path under `out_dir`, refusing any
/// component that would walk outside it.
fn safe_join(out_dir: &Path, logical: &str) -> Result<PathBuf> {
    let mut target = out_dir.to_path_buf();
    for component in Path::new(logical).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            _ => return Err(PakError::PathSecurity(logical.to_string())),
        }
    }
    Ok(target)
}
