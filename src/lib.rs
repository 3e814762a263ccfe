//! Snappak: single-file content archives with layered resolution
//!
//! This library implements the SNAPPAK package format and the content
//! resolution layer on top of it:
//! - One-pass archive builder with per-entry compression (Brotli/Deflate)
//!   and optional whole-archive AES-256-GCM encryption
//! - Archive reader with on-demand decompression and authenticated
//!   decryption (versions 1-3 of the on-disk format)
//! - Priority-ordered composite source that resolves logical paths across
//!   loose files, patches, and base packages
//!
//! # Example
//!
//! ```no_run
//! use snappak::{build, ArchiveSource, BuildOptions, ContentSource};
//! use std::io::Read;
//! use std::path::Path;
//!
//! build(Path::new("content"), Path::new("content.pak"), &BuildOptions::default())?;
//!
//! let pak = ArchiveSource::open_archive("content.pak")?;
//! let mut data = Vec::new();
//! pak.open("textures/stone.png")?.read_to_end(&mut data)?;
//! # Ok::<(), snappak::PakError>(())
//! ```

// Core modules
pub mod archive;
pub mod error;
pub mod keys;
pub mod source;
pub mod task;

// Re-export commonly used types
pub use archive::{
    build, extract_all, list_entries, verify, ArchiveSource, BuildOptions, CompressionKind,
    Entry, PakHeader, DEFAULT_MIN_SAVINGS, FORMAT_VERSION, HEADER_SIZE, MAGIC,
};
pub use error::{PakError, Result};
pub use keys::{parse_key_hex, KeyProvider, StaticKeyProvider};
pub use source::{CompositeSource, ContentSource, FilesystemSource};
