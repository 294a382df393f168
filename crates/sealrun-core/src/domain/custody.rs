//! Plaintext messages exchanged with the key-custody service.
//!
//! These travel inside envelopes; see `crate::envelope`.

use serde::{Deserialize, Serialize};

/// Response status. `code == 0` means OK.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub const OK: i32 = 0;

    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Data uuid of the input.
    pub resource_uri: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub initiator_party_id: String,
    pub op_name: String,
    pub scope: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Platform evidence bound to caller-supplied data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReport {
    pub str_report_version: String,
    pub str_report_type: String,
    pub str_tee_platform: String,
    /// Opaque evidence blob.
    pub json_report: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataKey {
    pub resource_uri: String,
    /// Standard base64 of the raw key.
    pub data_key_b64: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRaCertRequest {
    pub nonce: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRaCertResponse {
    #[serde(default)]
    pub status: Status,
    /// PEM certificate of the custody service.
    #[serde(default)]
    pub cert: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataKeysRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_report: Option<AttestationReport>,
    pub cert: String,
    pub resource_request: ResourceRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataKeysResponse {
    #[serde(default)]
    pub data_keys: Vec<DataKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDataKeysRequest {
    pub owner_party_id: String,
    #[serde(default)]
    pub data_keys: Vec<DataKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpConstraint {
    pub op_name: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub rule_id: String,
    #[serde(default)]
    pub grantee_party_ids: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub global_constraints: Vec<String>,
    #[serde(default)]
    pub op_constraints: Vec<OpConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPolicy {
    pub data_uuid: String,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDataPolicyRequest {
    pub owner_party_id: String,
    pub scope: String,
    pub policy: DataPolicy,
}

/// The part of a result-key registration that attestation binds to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultKeyBody {
    /// Output id.
    pub resource_uri: String,
    pub data_key_b64: String,
    pub scope: String,
    /// Every input id that fed the job.
    #[serde(default)]
    pub ancestor_uuids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResultDataKeyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_report: Option<AttestationReport>,
    pub body: ResultKeyBody,
}
