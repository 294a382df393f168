//! Signer identity - RSA 鍵と自己署名証明書
//!
//! The sidecar generates a fresh identity at startup. Its certificate is
//! bound into every attestation report, and the custody service seals
//! responses to it.

use std::fmt;

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_RSA_SHA256};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::Certificate;
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::{Decode, DecodePem, Encode};

use crate::domain::errors::{Result, SidecarError};

pub const RSA_BITS: usize = 3072;
pub const CERT_DAYS: i64 = 365;

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Private key plus the PEM certificate that advertises its public half.
#[derive(Clone)]
pub struct SignerIdentity {
    private_key: RsaPrivateKey,
    cert_pem: String,
}

impl SignerIdentity {
    /// 3072-bit key with a one-year self-signed certificate.
    pub fn generate() -> Result<Self> {
        Self::generate_with_bits(RSA_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits).map_err(SidecarError::crypto)?;
        let cert_pem = self_signed_cert(&private_key)?;
        tracing::debug!(bits, "generated signer identity");
        Ok(Self {
            private_key,
            cert_pem,
        })
    }

    /// Load a PKCS#8 (or PKCS#1) private key and its certificate. The
    /// certificate must carry the key's public half.
    pub fn from_pem(key_pem: &str, cert_pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| SidecarError::crypto(format!("unreadable private key: {e}")))?;
        let cert = parse_cert(cert_pem)?;
        if cert_public_key(&cert)? != RsaPublicKey::from(&private_key) {
            return Err(SidecarError::crypto("certificate does not match private key"));
        }
        Ok(Self {
            private_key,
            cert_pem: cert_pem.to_string(),
        })
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    /// RSASSA-PKCS1-v1_5 / SHA-256 signature over `msg`.
    pub fn sign_rs256(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key.try_sign(msg).map_err(SidecarError::crypto)?;
        Ok(signature.to_vec())
    }
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}

fn self_signed_cert(private_key: &RsaPrivateKey) -> Result<String> {
    let pkcs8 = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(SidecarError::crypto)?;
    let key_pair =
        KeyPair::from_pem_and_sign_algo(pkcs8.as_str(), &PKCS_RSA_SHA256).map_err(SidecarError::crypto)?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, "CN");
    dn.push(DnType::StateOrProvinceName, "HZ");
    dn.push(DnType::LocalityName, "HZ");
    dn.push(DnType::OrganizationName, "AntGroup");
    dn.push(DnType::OrganizationalUnitName, "SecretFlow");
    dn.push(DnType::CommonName, "TeeApps");

    let mut params = CertificateParams::default();
    params.distinguished_name = dn;
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(CERT_DAYS);

    let cert = params.self_signed(&key_pair).map_err(SidecarError::crypto)?;
    Ok(cert.pem())
}

pub fn parse_cert(pem: &str) -> Result<Certificate> {
    Certificate::from_pem(pem.as_bytes())
        .map_err(|e| SidecarError::format(format!("certificate is not valid PEM: {e}")))
}

pub fn cert_from_der(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| SidecarError::format(format!("certificate is not valid DER: {e}")))
}

/// DER bytes of a PEM certificate, as carried in `x5c`.
pub fn cert_der(pem: &str) -> Result<Vec<u8>> {
    parse_cert(pem)?.to_der().map_err(SidecarError::crypto)
}

pub fn cert_public_key(cert: &Certificate) -> Result<RsaPublicKey> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(SidecarError::crypto)?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| SidecarError::unsupported(format!("certificate key is not RSA: {e}")))
}

pub fn verify_rs256(public_key: &RsaPublicKey, msg: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::try_from(signature)
        .map_err(|e| SidecarError::Integrity(format!("malformed signature: {e}")))?;
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(msg, &signature)
        .map_err(|_| SidecarError::Integrity("signature verification failed".to_string()))
}

/// `child` の署名を `issuer` の公開鍵で検証する (sha256WithRSAEncryption のみ)
pub fn verify_issued_by(child: &Certificate, issuer: &Certificate) -> Result<()> {
    if child.signature_algorithm.oid != SHA256_WITH_RSA {
        return Err(SidecarError::unsupported(format!(
            "certificate signature algorithm {} not support",
            child.signature_algorithm.oid
        )));
    }
    let tbs = child.tbs_certificate.to_der().map_err(SidecarError::crypto)?;
    verify_rs256(&cert_public_key(issuer)?, &tbs, child.signature.raw_bytes())
}
