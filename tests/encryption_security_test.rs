//! Security tests for AES-256-GCM sealed entries: key handling, tamper
//! detection, and associated-data binding.

use snappak::{
    build, verify, ArchiveSource, BuildOptions, CompressionKind, ContentSource, KeyProvider,
    PakError, StaticKeyProvider,
};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed key for deterministic tests
fn test_key() -> [u8; 32] {
    [0x42; 32]
}

fn different_key() -> [u8; 32] {
    [0x99; 32]
}

fn provider(key: [u8; 32]) -> Option<Arc<dyn KeyProvider>> {
    Some(Arc::new(StaticKeyProvider::new(key)))
}

/// Build a single-entry encrypted archive and return its path.
fn encrypted_fixture(
    dir: &Path,
    compression: CompressionKind,
    path: &str,
    data: &[u8],
) -> PathBuf {
    let input = dir.join("input");
    let full = input.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(&full, data).unwrap();

    let pak = dir.join("content.pak");
    build(
        &input,
        &pak,
        &BuildOptions {
            compression,
            min_savings: 0.03,
            key: Some(test_key()),
        },
    )
    .unwrap();
    pak
}

fn open_entry(pak: &Path, key: Option<[u8; 32]>, path: &str) -> Result<Vec<u8>, PakError> {
    let source = ArchiveSource::open_archive_with_keys(pak, key.and_then(provider))?;
    let mut data = Vec::new();
    source.open(path)?.read_to_end(&mut data)?;
    Ok(data)
}

#[test]
fn test_encrypted_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let entry_check = ArchiveSource::open_archive(&pak).unwrap();
    assert!(entry_check.get_entry("secret.txt").unwrap().encrypted);

    let data = open_entry(&pak, Some(test_key()), "secret.txt").unwrap();
    assert_eq!(data, b"Confidential");
}

#[test]
fn test_encrypted_compressed_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"compress then encrypt ".repeat(100);
    let pak = encrypted_fixture(dir.path(), CompressionKind::Brotli, "notes.txt", &body);

    let source =
        ArchiveSource::open_archive_with_keys(&pak, provider(test_key())).unwrap();
    let entry = source.get_entry("notes.txt").unwrap();
    assert!(entry.encrypted);
    assert_eq!(entry.compression, CompressionKind::Brotli);

    let mut data = Vec::new();
    source.open("notes.txt").unwrap().read_to_end(&mut data).unwrap();
    assert_eq!(data, body);
}

#[test]
fn test_wrong_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let err = open_entry(&pak, Some(different_key()), "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_missing_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let err = open_entry(&pak, None, "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_wrong_length_key_fails() {
    struct ShortKey;
    impl KeyProvider for ShortKey {
        fn key(&self) -> Option<Vec<u8>> {
            Some(vec![0x42; 16])
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let source = ArchiveSource::open_archive_with_keys(&pak, Some(Arc::new(ShortKey))).unwrap();
    let err = source.open("secret.txt").err().unwrap();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_payload_tamper_detected() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let source = ArchiveSource::open_archive(&pak).unwrap();
    let offset = source.get_entry("secret.txt").unwrap().offset;
    drop(source);

    // Flip one ciphertext byte (just past the 12-byte nonce).
    let mut bytes = fs::read(&pak).unwrap();
    bytes[offset as usize + 12] ^= 0x01;
    fs::write(&pak, &bytes).unwrap();

    let err = open_entry(&pak, Some(test_key()), "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_tag_tamper_detected() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    let mut bytes = fs::read(&pak).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&pak, &bytes).unwrap();

    let err = open_entry(&pak, Some(test_key()), "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

/// Byte position of a field inside the first (and only) TOC record.
/// Record layout after the 12-byte header and 4-byte count:
/// [u16 path_len][path][u64 offset][u64 stored][u64 original][u8 kind][u8 flags]
fn record_field_offset(path: &str, field: usize) -> usize {
    12 + 4 + 2 + path.len() + field
}

#[test]
fn test_toc_original_length_tamper_detected() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    // Flip the low byte of the original-length field; the AAD no longer
    // matches what was sealed.
    let mut bytes = fs::read(&pak).unwrap();
    bytes[record_field_offset("secret.txt", 16)] ^= 0x01;
    fs::write(&pak, &bytes).unwrap();

    let err = open_entry(&pak, Some(test_key()), "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_toc_compression_kind_tamper_detected() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"compress then encrypt ".repeat(100);
    let pak = encrypted_fixture(dir.path(), CompressionKind::Brotli, "notes.txt", &body);

    // Rewrite kind Brotli -> Deflate; still a valid kind byte, but the AAD
    // binding catches the swap before any decompressor runs.
    let kind_at = record_field_offset("notes.txt", 24);
    let mut bytes = fs::read(&pak).unwrap();
    assert_eq!(bytes[kind_at], 1);
    bytes[kind_at] = 2;
    fs::write(&pak, &bytes).unwrap();

    let err = open_entry(&pak, Some(test_key()), "notes.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}

#[test]
fn test_verify_reports_per_entry() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("one.txt"), b"one").unwrap();
    fs::write(input.join("two.txt"), b"two").unwrap();
    let pak = dir.path().join("content.pak");
    build(
        &input,
        &pak,
        &BuildOptions {
            compression: CompressionKind::None,
            min_savings: 0.03,
            key: Some(test_key()),
        },
    )
    .unwrap();

    // With the right key everything passes.
    let mut sink = Vec::new();
    let failures = verify(&pak, &mut sink, provider(test_key())).unwrap();
    assert_eq!(failures, 0);
    let report = String::from_utf8(sink).unwrap();
    assert_eq!(report.lines().filter(|l| l.starts_with("ok")).count(), 2);

    // Without the key every entry is reported, none aborts the scan.
    let mut sink = Vec::new();
    let failures = verify(&pak, &mut sink, None).unwrap();
    assert_eq!(failures, 2);
    let report = String::from_utf8(sink).unwrap();
    assert_eq!(report.lines().filter(|l| l.starts_with("FAIL")).count(), 2);
}

#[test]
fn test_sealed_payload_too_short() {
    let dir = tempfile::tempdir().unwrap();
    let pak = encrypted_fixture(dir.path(), CompressionKind::None, "secret.txt", b"Confidential");

    // Shrink the stored length below nonce+tag.
    let mut bytes = fs::read(&pak).unwrap();
    let stored_at = record_field_offset("secret.txt", 8);
    bytes[stored_at..stored_at + 8].copy_from_slice(&10u64.to_le_bytes());
    fs::write(&pak, &bytes).unwrap();

    let err = open_entry(&pak, Some(test_key()), "secret.txt").unwrap_err();
    assert!(matches!(err, PakError::Crypto(_)));
}
