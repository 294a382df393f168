//! ReportGenerator port - remote attestation evidence

use crate::domain::custody::AttestationReport;
use crate::domain::errors::Result;
use crate::domain::platform::Platform;

/// Produces platform evidence bound to an arbitrary byte string.
///
/// The caller decides what to bind; the custody client binds its own
/// certificate together with the request it is about to send.
pub trait ReportGenerator: Send + Sync {
    fn generate(&self, platform: Platform, user_data: &[u8]) -> Result<AttestationReport>;
}
