//! Envelope protocol for talking to the key-custody service.
//!
//! A request is JSON, optionally wrapped in an RS256 JWS, then sealed in a
//! JWE whose content key is wrapped to the peer certificate. Responses are
//! sealed the same way but never signed.

pub mod identity;
pub mod jose;
pub mod seal;

pub use self::identity::{SignerIdentity, parse_cert, verify_issued_by, verify_rs256};
pub use self::jose::{ContentAlg, EncryptedRequest, EncryptedResponse, Jwe, Jws, KeyWrapAlg, SigAlg};
pub use self::seal::{
    EnvelopeOptions, open_request, parse_response, seal_request, seal_response, verify_jws,
};
