//! Key material for encrypted archives.

use crate::error::{PakError, Result};

/// Length of an AES-256-GCM key in bytes
pub const KEY_LEN: usize = 32;

/// Supplies the archive decryption key on demand.
///
/// Where the key comes from (CLI hex argument, OS secret store, ...) is the
/// implementor's business; the archive reader only depends on this
/// capability. Returning `None` means encrypted entries cannot be read.
pub trait KeyProvider: Send + Sync {
    fn key(&self) -> Option<Vec<u8>>;
}

/// Key provider backed by a fixed in-memory key.
pub struct StaticKeyProvider {
    key: [u8; KEY_LEN],
}

impl StaticKeyProvider {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Parse a 64-hex-character key.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        Ok(Self::new(parse_key_hex(hex_key)?))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.key.to_vec())
    }
}

/// Decode a 64-hex-character string into a 32-byte key.
pub fn parse_key_hex(hex_key: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| PakError::Usage(format!("invalid hex key: {e}")))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        PakError::Usage(format!(
            "key must be {KEY_LEN} bytes (64 hex characters), got {len} bytes"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_hex() {
        let key = parse_key_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key, [0xAB; 32]);
    }

    #[test]
    fn test_parse_key_hex_rejects_bad_hex() {
        let err = parse_key_hex("zz").unwrap_err();
        assert!(matches!(err, PakError::Usage(_)));
    }

    #[test]
    fn test_parse_key_hex_rejects_wrong_length() {
        let err = parse_key_hex("abcd").unwrap_err();
        assert!(matches!(err, PakError::Usage(_)));
    }

    #[test]
    fn test_static_provider_returns_key() {
        let provider = StaticKeyProvider::new([7u8; 32]);
        assert_eq!(provider.key().unwrap(), vec![7u8; 32]);
    }
}
