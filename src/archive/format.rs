use crate::error::{PakError, Result};
use std::io::{Read, Write};

/// Magic number: ASCII "SNAPPAK" padded with NUL to 8 bytes
pub const MAGIC: [u8; 8] = *b"SNAPPAK\0";

/// Current format version written by the builder
pub const FORMAT_VERSION: u16 = 3;

/// Header size in bytes: magic + version + reserved
pub const HEADER_SIZE: usize = 12;

/// AES-GCM nonce length embedded at the front of a sealed payload
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length at the end of a sealed payload
pub const TAG_LEN: usize = 16;

/// Smallest valid sealed payload: nonce + tag around an empty ciphertext
pub const MIN_SEALED_LEN: u64 = (NONCE_LEN + TAG_LEN) as u64;

/// Entry flag bit: payload is sealed under AES-256-GCM
pub const FLAG_ENCRYPTED: u8 = 0b0000_0001;

/// Compression applied to a stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionKind {
    None = 0,
    Brotli = 1,
    Deflate = 2,
}

impl CompressionKind {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Brotli),
            2 => Ok(Self::Deflate),
            _ => Err(PakError::Format(format!(
                "unknown compression kind {value}"
            ))),
        }
    }

    /// Short label for listings
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Brotli => "brotli",
            Self::Deflate => "deflate",
        }
    }
}

/// Fixed archive header
#[derive(Debug, Clone)]
pub struct PakHeader {
    pub version: u16,
    pub reserved: u16,
}

impl PakHeader {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            reserved: 0,
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.reserved.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC {
            return Err(PakError::Format(
                "not a recognized SNAPPAK package".to_string(),
            ));
        }

        let version = read_u16(&mut reader)?;
        let reserved = read_u16(&mut reader)?;

        Ok(Self { version, reserved })
    }

    /// Reject versions this reader does not understand
    pub fn validate_version(&self) -> Result<()> {
        match self.version {
            1..=FORMAT_VERSION => Ok(()),
            other => Err(PakError::Format(format!(
                "unsupported package version {other}"
            ))),
        }
    }
}

impl Default for PakHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One TOC record, decoded into its runtime form
#[derive(Debug, Clone)]
pub struct Entry {
    /// Normalized logical path as stored in the TOC
    pub path: String,
    /// Absolute byte offset of the payload within the archive file
    pub offset: u64,
    /// Stored (on-disk) payload length
    pub stored: u64,
    /// Original plaintext, decompressed length
    pub original: u64,
    pub compression: CompressionKind,
    pub encrypted: bool,
}

impl Entry {
    /// Serialize in the current (v3) record shape
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_path(&mut writer, &self.path)?;
        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.stored.to_le_bytes())?;
        writer.write_all(&self.original.to_le_bytes())?;
        writer.write_all(&[self.compression as u8])?;
        let flags = if self.encrypted { FLAG_ENCRYPTED } else { 0 };
        writer.write_all(&[flags])?;
        Ok(())
    }

    /// Encoded size of this record in the v3 shape
    pub fn encoded_len(&self) -> u64 {
        2 + self.path.len() as u64 + 8 + 8 + 8 + 1 + 1
    }

    /// Parse one record in the shape used by `version`
    pub fn read_from<R: Read>(mut reader: R, version: u16) -> Result<Self> {
        let path = read_path(&mut reader)?;
        let offset = read_u64(&mut reader)?;

        if version == 1 {
            // Legacy records carry a single length that doubles as stored
            // and original size; no compression or encryption metadata.
            let length = read_u64(&mut reader)?;
            return Ok(Self {
                path,
                offset,
                stored: length,
                original: length,
                compression: CompressionKind::None,
                encrypted: false,
            });
        }

        let stored = read_u64(&mut reader)?;
        let original = read_u64(&mut reader)?;

        let mut kind = [0u8; 1];
        reader.read_exact(&mut kind)?;
        let compression = CompressionKind::from_u8(kind[0])?;

        let encrypted = if version >= 3 {
            let mut flags = [0u8; 1];
            reader.read_exact(&mut flags)?;
            flags[0] & FLAG_ENCRYPTED != 0
        } else {
            false
        };

        Ok(Self {
            path,
            offset,
            stored,
            original,
            compression,
            encrypted,
        })
    }

    /// Associated data bound to a sealed payload: path bytes, original
    /// length (LE), compression kind. Splicing a valid ciphertext under a
    /// different TOC record breaks the authentication tag.
    pub fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.path.len() + 9);
        aad.extend_from_slice(self.path.as_bytes());
        aad.extend_from_slice(&self.original.to_le_bytes());
        aad.push(self.compression as u8);
        aad
    }
}

fn write_path<W: Write>(mut writer: W, path: &str) -> Result<()> {
    let bytes = path.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(PakError::Format(format!("path too long: {path}")));
    }
    writer.write_all(&(bytes.len() as u16).to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_path<R: Read>(mut reader: R) -> Result<String> {
    let len = read_u16(&mut reader)? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| PakError::Format(format!("invalid UTF-8 in path: {e}")))
}

// Helper functions for reading primitive types
fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
