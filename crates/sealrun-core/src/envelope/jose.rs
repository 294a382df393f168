//! JOSE structures carried on the wire.
//!
//! Every binary field is unpadded base64url, except `x5c`, which holds the
//! standard-base64 DER of the sender certificate.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::domain::custody::Status;
use crate::domain::errors::{Result, SidecarError};

/// Signature algorithm of the inner JWS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigAlg {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
}

/// How the content-encryption key is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWrapAlg {
    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    RsaOaep,
}

/// Content encryption of the JWE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAlg {
    A128Gcm,
}

impl ContentAlg {
    pub fn key_len(&self) -> usize {
        match self {
            ContentAlg::A128Gcm => 16,
        }
    }
}

macro_rules! jose_name {
    ($ty:ty { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = SidecarError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok($variant),)+
                    other => Err(SidecarError::unsupported(format!(
                        "{} `{other}` not support",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

jose_name!(SigAlg { SigAlg::Rs256 => "RS256" });
jose_name!(KeyWrapAlg { KeyWrapAlg::RsaOaep => "RSA-OAEP" });
jose_name!(ContentAlg { ContentAlg::A128Gcm => "A128GCM" });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwe {
    pub protected_header: String,
    pub encrypted_key: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
    #[serde(default)]
    pub aad: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default)]
    pub x5c: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jws {
    pub protected_header: String,
    pub payload: String,
    pub signature: String,
}

impl Jws {
    /// The bytes the signature covers.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.protected_header, self.payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRequest {
    #[serde(default)]
    pub header: RequestHeader,
    pub has_signature: bool,
    pub message: Jwe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Jwe>,
}

pub fn b64url(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn b64url_decode(field: &str, value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| SidecarError::format(format!("{field} is not base64url: {e}")))
}

pub fn b64std(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

pub fn b64std_decode(field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| SidecarError::format(format!("{field} is not base64: {e}")))
}

/// Decode a base64url field holding JSON.
pub fn decode_json<T: serde::de::DeserializeOwned>(field: &str, value: &str) -> Result<T> {
    let raw = b64url_decode(field, value)?;
    serde_json::from_slice(&raw)
        .map_err(|e| SidecarError::format(format!("{field} is not valid json: {e}")))
}
