//! Simulated attestation for the `sim` platform and tests.

use sha2::{Digest, Sha256};

use crate::domain::custody::AttestationReport;
use crate::domain::errors::Result;
use crate::domain::platform::Platform;
use crate::ports::ReportGenerator;

pub const REPORT_TYPE_PASSPORT: &str = "Passport";

/// Evidence is the hex SHA-256 of the user data. Deterministic, so a fake
/// service can recompute it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedReportGenerator;

impl ReportGenerator for SimulatedReportGenerator {
    fn generate(&self, platform: Platform, user_data: &[u8]) -> Result<AttestationReport> {
        Ok(AttestationReport {
            str_report_version: "1.0".to_string(),
            str_report_type: REPORT_TYPE_PASSPORT.to_string(),
            str_tee_platform: platform.as_str().to_uppercase(),
            json_report: hex::encode(Sha256::digest(user_data)),
        })
    }
}
