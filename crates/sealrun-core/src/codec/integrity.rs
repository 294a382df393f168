//! Segment MACs for plaintext files.
//!
//! `HMAC-SHA256(key, data_uuid || part_id || seg_id || shard_id || contents)`
//!
//! Library utility for callers that already hold an expected segment digest.
//! The task pipeline does not call it: job descriptors carry no digest.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::errors::{Result, SidecarError};

type HmacSha256 = Hmac<Sha256>;

/// Identifies one segment of a partitioned, secret-shared dataset.
#[derive(Debug, Clone, Copy)]
pub struct SegmentId<'a> {
    pub data_uuid: &'a [u8],
    pub part_id: &'a [u8],
    pub seg_id: &'a [u8],
    pub shard_id: &'a [u8],
}

fn keyed(key: &[u8], segment: &SegmentId<'_>, path: &Path) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(SidecarError::crypto)?;
    mac.update(segment.data_uuid);
    mac.update(segment.part_id);
    mac.update(segment.seg_id);
    mac.update(segment.shard_id);

    let mut file = File::open(path).map_err(|e| SidecarError::io(path, e))?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| SidecarError::io(path, e))?;
        if n == 0 {
            break;
        }
        mac.update(&buf[..n]);
    }
    Ok(mac)
}

pub fn segment_mac(key: &[u8], segment: &SegmentId<'_>, path: &Path) -> Result<[u8; 32]> {
    let tag = keyed(key, segment, path)?.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Recompute the MAC of `path` and compare it with `expected` in constant time.
pub fn verify_file_integrity(
    key: &[u8],
    segment: &SegmentId<'_>,
    path: &Path,
    expected: &[u8],
) -> Result<()> {
    keyed(key, segment, path)?
        .verify_slice(expected)
        .map_err(|_| SidecarError::Integrity(format!("{}: file integrity check failed", path.display())))
}
