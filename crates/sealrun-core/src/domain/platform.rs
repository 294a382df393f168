//! Platform and deployment mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::SidecarError;

/// TEE platform the sidecar runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// No hardware; attestation reports are not attached.
    Sim,
    Sgx,
    Tdx,
    Csv,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sim => "sim",
            Platform::Sgx => "sgx",
            Platform::Tdx => "tdx",
            Platform::Csv => "csv",
        }
    }

    /// Whether custody calls must carry an attestation report.
    pub fn requires_attestation(&self) -> bool {
        !matches!(self, Platform::Sim)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SidecarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sim" => Ok(Platform::Sim),
            "sgx" => Ok(Platform::Sgx),
            "tdx" => Ok(Platform::Tdx),
            "csv" => Ok(Platform::Csv),
            other => Err(SidecarError::unsupported(format!("plat {other} not support"))),
        }
    }
}

/// Where job parameters come from and where outputs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Signed descriptor on local disk, outputs copied to their uri.
    Local,
    /// Orchestrator-provided descriptor, outputs published as domain data.
    Kuscia,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Local => "local",
            AppMode::Kuscia => "kuscia",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = SidecarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(AppMode::Local),
            "kuscia" => Ok(AppMode::Kuscia),
            other => Err(SidecarError::unsupported(format!("app mode {other} not support"))),
        }
    }
}
