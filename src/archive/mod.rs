//! Archive format, reading, and building
//!
//! - `format`: on-disk header and TOC codec (versions 1-3)
//! - `reader`: `ArchiveSource`, the content source over one package
//! - `writer`: one-pass builder plus list/extract/verify utilities

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{CompressionKind, Entry, PakHeader, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use reader::ArchiveSource;
pub use writer::{
    build, extract_all, list_entries, verify, BuildOptions, DEFAULT_MIN_SAVINGS,
};
