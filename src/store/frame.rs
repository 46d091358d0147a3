//! Record file framing
//!
//! A record file is the 8-byte [`FILE_MAGIC`] followed by frames:
//!
//! ```text
//! [length: u32 LE][crc32: u32 LE][payload: length bytes of JSON]
//! ```

use crate::error::LoaderError;

/// First bytes of every record file
pub const FILE_MAGIC: [u8; 8] = *b"EXPREC01";

/// Size of the per-frame header
pub const FRAME_HEADER_LEN: usize = 8;

/// Largest payload a frame may carry
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn for_payload(payload: &[u8]) -> Result<Self, LoaderError> {
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_LEN)
            .ok_or_else(|| {
                LoaderError::CorruptStore(format!(
                    "record of {} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit",
                    payload.len()
                ))
            })?;
        Ok(Self {
            length,
            checksum: Self::crc32(payload),
        })
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_LEN]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = *bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }

    pub fn crc32(payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        hasher.finalize()
    }

    pub fn validate_crc(&self, payload: &[u8]) -> bool {
        Self::crc32(payload) == self.checksum
    }
}
