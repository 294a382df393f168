//! Hybrid envelope: RSA-OAEP wrapped content key, AES-GCM payload, optional
//! RS256 inner signature.

use rsa::{Oaep, RsaPrivateKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha1::Sha1;

use super::identity::{
    SignerIdentity, cert_der, cert_from_der, cert_public_key, parse_cert, verify_rs256,
};
use super::jose::{
    ContentAlg, EncryptedRequest, EncryptedResponse, Jwe, JweHeader, Jws, JwsHeader, KeyWrapAlg,
    RequestHeader, SigAlg, b64std, b64std_decode, b64url, b64url_decode, decode_json,
};
use crate::codec::cipher::{AeadCipher, IV_LEN, random_iv};
use crate::domain::custody::Status;
use crate::domain::errors::{Result, SidecarError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeOptions {
    pub sign: bool,
    pub sig_alg: SigAlg,
    pub key_wrap: KeyWrapAlg,
    pub content: ContentAlg,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            sign: true,
            sig_alg: SigAlg::Rs256,
            key_wrap: KeyWrapAlg::RsaOaep,
            content: ContentAlg::A128Gcm,
        }
    }
}

impl EnvelopeOptions {
    pub fn unsigned() -> Self {
        Self {
            sign: false,
            ..Self::default()
        }
    }
}

/// Encrypt `payload` to the holder of `peer_cert_pem`.
///
/// When `opts.sign` is set the plaintext is a JWS signed by `sender`,
/// otherwise it is the payload JSON itself.
pub fn seal_request<T: Serialize>(
    payload: &T,
    sender: &SignerIdentity,
    peer_cert_pem: &str,
    opts: EnvelopeOptions,
) -> Result<EncryptedRequest> {
    let json = serde_json::to_vec(payload)?;
    let plaintext = if opts.sign {
        let jws = sign_jws(&json, sender, opts.sig_alg)?;
        serde_json::to_vec(&jws)?
    } else {
        json
    };
    Ok(EncryptedRequest {
        header: RequestHeader::default(),
        has_signature: opts.sign,
        message: seal_jwe(plaintext, peer_cert_pem, opts)?,
    })
}

/// Service side of [`seal_request`]. Returns the payload and, for signed
/// requests, the signer's certificate after the signature has been checked.
pub fn open_request<T: DeserializeOwned>(
    req: &EncryptedRequest,
    recipient_key: &RsaPrivateKey,
) -> Result<(T, Option<String>)> {
    let plaintext = open_jwe(&req.message, recipient_key)?;
    if !req.has_signature {
        return Ok((serde_json::from_slice(&plaintext)?, None));
    }
    let jws: Jws = serde_json::from_slice(&plaintext)?;
    let header: JwsHeader = decode_json("jws.protected_header", &jws.protected_header)?;
    let leaf = header
        .x5c
        .first()
        .ok_or_else(|| SidecarError::format("signed request carries no x5c certificate"))?;
    let der = b64std_decode("x5c", leaf)?;
    let cert = cert_from_der(&der)?;
    let payload = verify_jws_with(&jws, &header, &cert_public_key(&cert)?)?;
    Ok((serde_json::from_slice(&payload)?, Some(pem_from_der(&der))))
}

/// Check the inner signature of `jws` against `cert_pem` and return the
/// decoded payload bytes.
pub fn verify_jws(jws: &Jws, cert_pem: &str) -> Result<Vec<u8>> {
    let header: JwsHeader = decode_json("jws.protected_header", &jws.protected_header)?;
    let public_key = cert_public_key(&parse_cert(cert_pem)?)?;
    verify_jws_with(jws, &header, &public_key)
}

/// Responses are never signed.
pub fn seal_response<T: Serialize>(
    status: Status,
    payload: Option<&T>,
    peer_cert_pem: &str,
) -> Result<EncryptedResponse> {
    let message = match payload {
        Some(p) if status.is_ok() => {
            let json = serde_json::to_vec(p)?;
            Some(seal_jwe(json, peer_cert_pem, EnvelopeOptions::unsigned())?)
        }
        _ => None,
    };
    Ok(EncryptedResponse { status, message })
}

/// A non-OK status comes back as-is without touching the message.
pub fn parse_response<T: DeserializeOwned>(
    res: &EncryptedResponse,
    recipient_key: &RsaPrivateKey,
) -> Result<(Status, Option<T>)> {
    if !res.status.is_ok() {
        return Ok((res.status.clone(), None));
    }
    let jwe = res
        .message
        .as_ref()
        .ok_or_else(|| SidecarError::format("OK response carries no message"))?;
    let plaintext = open_jwe(jwe, recipient_key)?;
    Ok((res.status.clone(), Some(serde_json::from_slice(&plaintext)?)))
}

fn sign_jws(payload: &[u8], sender: &SignerIdentity, alg: SigAlg) -> Result<Jws> {
    let header = JwsHeader {
        alg: alg.to_string(),
        x5c: vec![b64std(cert_der(sender.cert_pem())?)],
    };
    let mut jws = Jws {
        protected_header: b64url(serde_json::to_vec(&header)?),
        payload: b64url(payload),
        signature: String::new(),
    };
    let signature = match alg {
        SigAlg::Rs256 => sender.sign_rs256(jws.signing_input().as_bytes())?,
    };
    jws.signature = b64url(signature);
    Ok(jws)
}

fn verify_jws_with(jws: &Jws, header: &JwsHeader, public_key: &rsa::RsaPublicKey) -> Result<Vec<u8>> {
    let signature = b64url_decode("jws.signature", &jws.signature)?;
    match header.alg.parse::<SigAlg>()? {
        SigAlg::Rs256 => verify_rs256(public_key, jws.signing_input().as_bytes(), &signature)?,
    }
    b64url_decode("jws.payload", &jws.payload)
}

fn seal_jwe(mut plaintext: Vec<u8>, peer_cert_pem: &str, opts: EnvelopeOptions) -> Result<Jwe> {
    let peer_key = cert_public_key(&parse_cert(peer_cert_pem)?)?;
    let header = JweHeader {
        alg: opts.key_wrap.to_string(),
        enc: opts.content.to_string(),
    };

    let mut cek = vec![0u8; opts.content.key_len()];
    rand::Rng::fill(&mut rand::thread_rng(), &mut cek[..]);
    let encrypted_key = match opts.key_wrap {
        KeyWrapAlg::RsaOaep => peer_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &cek)
            .map_err(SidecarError::crypto)?,
    };

    let iv = random_iv();
    let aad: &[u8] = b"";
    let tag = AeadCipher::new(&cek)?.seal_in_place(&iv, aad, &mut plaintext)?;

    Ok(Jwe {
        protected_header: b64url(serde_json::to_vec(&header)?),
        encrypted_key: b64url(encrypted_key),
        iv: b64url(iv),
        ciphertext: b64url(plaintext),
        tag: b64url(tag),
        aad: b64url(aad),
    })
}

fn open_jwe(jwe: &Jwe, recipient_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let header: JweHeader = decode_json("jwe.protected_header", &jwe.protected_header)?;
    let key_wrap: KeyWrapAlg = header.alg.parse()?;
    let content: ContentAlg = header.enc.parse()?;

    let wrapped = b64url_decode("jwe.encrypted_key", &jwe.encrypted_key)?;
    let cek = match key_wrap {
        KeyWrapAlg::RsaOaep => recipient_key
            .decrypt(Oaep::new::<Sha1>(), &wrapped)
            .map_err(|_| SidecarError::Integrity("content key unwrap failed".to_string()))?,
    };
    if cek.len() != content.key_len() {
        return Err(SidecarError::format(format!(
            "content key length {} does not match {content}",
            cek.len()
        )));
    }

    let iv = b64url_decode("jwe.iv", &jwe.iv)?;
    if iv.len() != IV_LEN {
        return Err(SidecarError::format(format!("jwe.iv length {} != {IV_LEN}", iv.len())));
    }
    let aad = b64url_decode("jwe.aad", &jwe.aad)?;
    let tag = b64url_decode("jwe.tag", &jwe.tag)?;
    let mut buf = b64url_decode("jwe.ciphertext", &jwe.ciphertext)?;
    AeadCipher::new(&cek)?.open_in_place(&iv, &aad, &mut buf, &tag)?;
    Ok(buf)
}

fn pem_from_der(der: &[u8]) -> String {
    let body = b64std(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}
