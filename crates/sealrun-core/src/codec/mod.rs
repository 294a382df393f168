//! Block-based authenticated file encryption.
//!
//! Artifacts at rest are AES-GCM encrypted in fixed-size blocks, each with
//! its own random IV and tag, so files of any size stream through one block
//! of memory. See [`format`] for the byte layout.

pub mod cipher;
pub mod file;
pub mod format;
pub mod integrity;

pub use self::cipher::{AeadCipher, IV_LEN, TAG_LEN};
pub use self::file::{DEFAULT_BLOCK_LENGTH, FileCodec};
pub use self::format::{BLOCK_HEADER_LEN, BlockHeader, FileHeader, HEADER_LEN};
pub use self::integrity::{SegmentId, segment_mac, verify_file_integrity};
