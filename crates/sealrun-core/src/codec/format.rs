//! On-disk framing of encrypted artifacts.
//!
//! ```text
//! file   := header block{packet_count}
//! header := version:u32 schema:u32 packet_count:u64 block_length:u32   (20 bytes, LE)
//! block  := iv_len:u64 iv[32] mac_len:u64 mac[32] ciphertext[..]      (80-byte framing)
//! ```
//!
//! IV and MAC live in fixed 32-byte slots; their real length is always the
//! explicit prefix. Every block but the last is exactly `block_length` bytes.

use crate::domain::errors::{Result, SidecarError};

pub const FILE_VERSION: u32 = 1;
pub const FILE_SCHEMA: u32 = 1;
pub const HEADER_LEN: usize = 4 + 4 + 8 + 4;

pub const SLOT_LEN: usize = 32;
pub const BLOCK_HEADER_LEN: usize = 8 + SLOT_LEN + 8 + SLOT_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub schema: u32,
    pub packet_count: u64,
    pub block_length: u32,
}

impl FileHeader {
    pub fn new(packet_count: u64, block_length: u32) -> Self {
        Self {
            version: FILE_VERSION,
            schema: FILE_SCHEMA,
            packet_count,
            block_length,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..8].copy_from_slice(&self.schema.to_le_bytes());
        out[8..16].copy_from_slice(&self.packet_count.to_le_bytes());
        out[16..20].copy_from_slice(&self.block_length.to_le_bytes());
        out
    }

    /// Version and schema are carried but not interpreted.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| SidecarError::format("file header truncated"))?;
        Ok(Self {
            version: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            schema: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            packet_count: u64::from_le_bytes([
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ]),
            block_length: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        })
    }

    /// Check the header against the length of everything after it and return
    /// the length of the final block.
    pub fn validate(&self, body_len: u64) -> Result<u64> {
        if self.block_length == 0 {
            return Err(SidecarError::format("block_length must be positive"));
        }
        if (self.block_length as usize) <= BLOCK_HEADER_LEN {
            return Err(SidecarError::format(format!(
                "block_length {} cannot hold the {BLOCK_HEADER_LEN}-byte block framing",
                self.block_length
            )));
        }
        if self.packet_count == 0 {
            return Err(SidecarError::format("packet_count must be at least 1"));
        }
        let block_length = u64::from(self.block_length);
        let max_len = self.packet_count.checked_mul(block_length).ok_or_else(|| {
            SidecarError::format(format!(
                "packet_count {} * block_length {} overflows",
                self.packet_count, self.block_length
            ))
        })?;
        let full_blocks_len = max_len - block_length;
        if body_len < full_blocks_len || body_len > max_len {
            return Err(SidecarError::format(format!(
                "body length {body_len} outside [{full_blocks_len}, {max_len}] for {} blocks",
                self.packet_count
            )));
        }
        let last = body_len - full_blocks_len;
        if last < BLOCK_HEADER_LEN as u64 {
            return Err(SidecarError::format(format!(
                "final block of {last} bytes is shorter than its framing"
            )));
        }
        Ok(last)
    }
}

/// Framing in front of each block's ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    iv_len: u64,
    iv: [u8; SLOT_LEN],
    mac_len: u64,
    mac: [u8; SLOT_LEN],
}

impl BlockHeader {
    pub fn new(iv: &[u8], mac: &[u8]) -> Result<Self> {
        if iv.len() > SLOT_LEN || mac.len() > SLOT_LEN {
            return Err(SidecarError::format("iv or mac longer than its 32-byte slot"));
        }
        let mut header = Self {
            iv_len: iv.len() as u64,
            iv: [0u8; SLOT_LEN],
            mac_len: mac.len() as u64,
            mac: [0u8; SLOT_LEN],
        };
        header.iv[..iv.len()].copy_from_slice(iv);
        header.mac[..mac.len()].copy_from_slice(mac);
        Ok(header)
    }

    pub fn encode(&self) -> [u8; BLOCK_HEADER_LEN] {
        let mut out = [0u8; BLOCK_HEADER_LEN];
        out[0..8].copy_from_slice(&self.iv_len.to_le_bytes());
        out[8..40].copy_from_slice(&self.iv);
        out[40..48].copy_from_slice(&self.mac_len.to_le_bytes());
        out[48..80].copy_from_slice(&self.mac);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BLOCK_HEADER_LEN {
            return Err(SidecarError::format("block framing truncated"));
        }
        let read_u64 = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf)
        };
        let iv_len = read_u64(0);
        let mac_len = read_u64(40);
        if iv_len > SLOT_LEN as u64 || mac_len > SLOT_LEN as u64 {
            return Err(SidecarError::format(format!(
                "iv_len {iv_len} / mac_len {mac_len} exceed the {SLOT_LEN}-byte slot"
            )));
        }
        let mut iv = [0u8; SLOT_LEN];
        iv.copy_from_slice(&bytes[8..40]);
        let mut mac = [0u8; SLOT_LEN];
        mac.copy_from_slice(&bytes[48..80]);
        Ok(Self {
            iv_len,
            iv,
            mac_len,
            mac,
        })
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv[..self.iv_len as usize]
    }

    pub fn mac(&self) -> &[u8] {
        &self.mac[..self.mac_len as usize]
    }
}
