//! LocalJobSource - 署名付きの entry task config を読む
//!
//! `{"task_input_config": {"tee_task_config": {...}}}` を読み、証明書チェーン
//! と initiator の署名を検証してから `task_body` を `JobParams` に復元する。

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::domain::errors::{Result, SidecarError};
use crate::domain::job::{JobDescriptor, JobParams, TeeTaskConfig};
use crate::envelope::identity::{cert_public_key, parse_cert, verify_issued_by, verify_rs256};
use crate::envelope::jose::{SigAlg, b64std_decode};
use crate::ports::JobSource;

#[derive(Debug, Deserialize)]
struct EntryConfig {
    task_input_config: TaskInputConfig,
}

#[derive(Debug, Deserialize)]
struct TaskInputConfig {
    tee_task_config: TeeTaskConfig,
}

#[derive(Debug, Clone)]
pub struct LocalJobSource {
    path: PathBuf,
}

impl LocalJobSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and verify an entry config document.
    pub fn from_json(raw: &str) -> Result<JobDescriptor> {
        let entry: EntryConfig = serde_json::from_str(raw)?;
        let task = entry.task_input_config.tee_task_config;
        verify_task_config(&task)?;

        let body = b64std_decode("task_body", &task.task_body)?;
        let params: JobParams = serde_json::from_slice(&body)?;
        info!(
            initiator = %task.task_initiator_id,
            component = %params.component_key(),
            "local task config verified"
        );
        Ok(JobDescriptor {
            params,
            task,
            storage: None,
        })
    }
}

impl JobSource for LocalJobSource {
    fn load(&self) -> Result<JobDescriptor> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| SidecarError::io(&self.path, e))?;
        Self::from_json(&raw)
    }
}

/// Each cert must be issued by the one after it; the first cert signs
/// `initiator_id + "." + scope + "." + task_body`.
fn verify_task_config(task: &TeeTaskConfig) -> Result<()> {
    let certs = task
        .task_initiator_certs
        .iter()
        .map(|pem| parse_cert(pem))
        .collect::<Result<Vec<_>>>()?;
    let leaf = certs
        .first()
        .ok_or_else(|| SidecarError::format("task_initiator_certs empty"))?;
    for pair in certs.windows(2) {
        verify_issued_by(&pair[0], &pair[1])?;
    }

    let signature = b64std_decode("signature", &task.signature)?;
    let signed = format!("{}.{}.{}", task.task_initiator_id, task.scope, task.task_body);
    match task.sign_algorithm.parse::<SigAlg>()? {
        SigAlg::Rs256 => verify_rs256(&cert_public_key(leaf)?, signed.as_bytes(), &signature),
    }
}
