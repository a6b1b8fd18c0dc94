//! Binary object header.
//!
//! Every object file (blob, tree or snapshot) starts with a 16-byte header
//! followed by the payload:
//!
//! ```text
//! 0x00  4   "SNPD" magic
//! 0x04  1   version (u8) = 1
//! 0x05  1   type: 1=blob, 2=tree, 3=snapshot
//! 0x06  1   algo: 1=blake3-256
//! 0x07  1   compression: 0=none, 1=zstd
//! 0x08  8   payload_len (u64 LE) - stored (possibly compressed) size
//! 0x10  ... payload
//! ```

use crate::error::{Error, Result};
use crate::hash::Algorithm;

/// Magic bytes at the start of every object file.
pub const MAGIC: &[u8; 4] = b"SNPD";

/// Current object format version.
pub const VERSION: u8 = 1;

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// A blob (one content block of file data).
    Blob = 1,
    /// A tree (one directory level).
    Tree = 2,
    /// A snapshot record.
    Snapshot = 3,
}

impl ObjectType {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ObjectType::Blob),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Snapshot),
            _ => Err(Error::invalid_header(format!(
                "Invalid object type: {}",
                value
            ))),
        }
    }

    /// Get the string name of this object type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Snapshot => "snapshot",
        }
    }
}

/// Compression types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression.
    None = 0,
    /// Zstandard compression.
    Zstd = 1,
}

impl CompressionType {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Zstd),
            _ => Err(Error::invalid_header(format!(
                "Invalid compression type: {}",
                value
            ))),
        }
    }
}

/// A 16-byte object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Object format version.
    pub version: u8,
    /// Object type.
    pub object_type: ObjectType,
    /// Hash algorithm used.
    pub algorithm: Algorithm,
    /// Compression applied to the payload.
    pub compression: CompressionType,
    /// Length of the stored payload in bytes.
    pub payload_len: u64,
}

impl ObjectHeader {
    /// Create a new object header.
    pub fn new(
        object_type: ObjectType,
        algorithm: Algorithm,
        compression: CompressionType,
        payload_len: u64,
    ) -> Self {
        Self {
            version: VERSION,
            object_type,
            algorithm,
            compression,
            payload_len,
        }
    }

    /// Encode the header to a 16-byte array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        buf[5] = self.object_type.to_u8();
        buf[6] = self.algorithm.id();
        buf[7] = self.compression.to_u8();
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());

        buf
    }

    /// Decode a header from the first 16 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "Header too short: {} bytes (expected {})",
                buf.len(),
                HEADER_SIZE
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::invalid_header(format!(
                "Invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &buf[0..4]
            )));
        }

        let version = buf[4];
        if version != VERSION {
            return Err(Error::invalid_header(format!(
                "Unsupported version: {} (expected {})",
                version, VERSION
            )));
        }

        let object_type = ObjectType::from_u8(buf[5])?;
        let algorithm = Algorithm::from_id(buf[6])?;
        let compression = CompressionType::from_u8(buf[7])?;

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[8..16]);
        let payload_len = u64::from_le_bytes(len_bytes);

        Ok(Self {
            version,
            object_type,
            algorithm,
            compression,
            payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(version: u8, object_type: u8, compression: u8) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = version;
        buf[5] = object_type;
        buf[6] = Algorithm::Blake3.id();
        buf[7] = compression;
        buf
    }

    #[test]
    fn test_object_type_conversions() {
        assert_eq!(ObjectType::from_u8(1).unwrap(), ObjectType::Blob);
        assert_eq!(ObjectType::from_u8(2).unwrap(), ObjectType::Tree);
        assert_eq!(ObjectType::from_u8(3).unwrap(), ObjectType::Snapshot);

        assert!(ObjectType::from_u8(0).is_err());
        assert!(ObjectType::from_u8(4).is_err());
    }

    #[test]
    fn test_header_encode_decode_snapshot() {
        let header = ObjectHeader::new(
            ObjectType::Snapshot,
            Algorithm::Blake3,
            CompressionType::None,
            512,
        );
        let encoded = header.encode();

        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(&encoded[0..4], MAGIC);
        assert_eq!(ObjectHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn test_header_decode_zstd_blob() {
        let mut buf = raw_header(VERSION, ObjectType::Blob.to_u8(), 1);
        buf[8..16].copy_from_slice(&4096u64.to_le_bytes());

        let header = ObjectHeader::decode(&buf).unwrap();
        assert_eq!(header.compression, CompressionType::Zstd);
        assert_eq!(header.payload_len, 4096);
    }

    #[test]
    fn test_header_decode_rejects_garbage() {
        let mut bad_magic = raw_header(VERSION, 1, 0);
        bad_magic[0..4].copy_from_slice(b"CAFS");
        assert!(ObjectHeader::decode(&bad_magic).is_err());

        assert!(ObjectHeader::decode(&raw_header(99, 1, 0)).is_err());
        assert!(ObjectHeader::decode(&raw_header(VERSION, 99, 0)).is_err());
        assert!(ObjectHeader::decode(&raw_header(VERSION, 1, 7)).is_err());
        assert!(ObjectHeader::decode(&[0u8; 4]).is_err());
    }
}
