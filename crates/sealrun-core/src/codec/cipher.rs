//! AES-GCM with the key size picking the variant.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce, Tag};

use crate::domain::errors::{Result, SidecarError};

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// AEAD used for file blocks and envelope payloads. File blocks always use
/// empty associated data.
pub enum AeadCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl AeadCipher {
    /// 16 bytes selects AES-128-GCM, 32 bytes AES-256-GCM.
    pub fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| AeadCipher::Aes128(Box::new(c)))
                .map_err(|_| SidecarError::InvalidKeySize(key.len())),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| AeadCipher::Aes256(Box::new(c)))
                .map_err(|_| SidecarError::InvalidKeySize(key.len())),
            n => Err(SidecarError::InvalidKeySize(n)),
        }
    }

    /// Encrypt `buf` in place and return the detached tag.
    pub fn seal_in_place(
        &self,
        iv: &[u8; IV_LEN],
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<[u8; TAG_LEN]> {
        let nonce = Nonce::from_slice(iv);
        let tag = match self {
            AeadCipher::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            AeadCipher::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buf),
        }
        .map_err(|_| SidecarError::crypto("aes-gcm encryption failed"))?;
        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Decrypt `buf` in place. A wrong tag is an integrity failure; a wrong
    /// IV or tag length is a format failure.
    pub fn open_in_place(&self, iv: &[u8], aad: &[u8], buf: &mut [u8], tag: &[u8]) -> Result<()> {
        if iv.len() != IV_LEN {
            return Err(SidecarError::format(format!("iv length {} != {IV_LEN}", iv.len())));
        }
        if tag.len() != TAG_LEN {
            return Err(SidecarError::format(format!("tag length {} != {TAG_LEN}", tag.len())));
        }
        let nonce = Nonce::from_slice(iv);
        let tag = Tag::from_slice(tag);
        match self {
            AeadCipher::Aes128(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
            AeadCipher::Aes256(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
        }
        .map_err(|_| SidecarError::Integrity("aes-gcm tag mismatch".to_string()))
    }
}

/// A fresh random IV.
pub fn random_iv() -> [u8; IV_LEN] {
    rand::random()
}
