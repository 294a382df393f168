//! Sidecar configuration.
//!
//! Every field has a default matching the enclave image layout, so an empty
//! JSON object (or no config file at all) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{Result, SidecarError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPaths {
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub ca_cert: PathBuf,
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            client_cert: PathBuf::from("/host/certs/client.crt"),
            client_key: PathBuf::from("/host/certs/client.key"),
            ca_cert: PathBuf::from("/host/certs/ca.crt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Scratch directory for decrypted inputs and plaintext outputs.
    pub task_base_dir: PathBuf,
    /// Where the worker's task-config document is written. Defaults to
    /// `<task_base_dir>/task_config.json`.
    pub task_config_path: Option<PathBuf>,
    pub rpc_timeout_ms: u64,
    pub tls: TlsPaths,
    pub python_path: PathBuf,
    /// Interpreter inside the SGX library OS image.
    pub occlum_python_path: PathBuf,
    pub worker_root: PathBuf,
    pub block_length: u32,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            task_base_dir: PathBuf::from("/home/teeapp/task"),
            task_config_path: None,
            rpc_timeout_ms: 5000,
            tls: TlsPaths::default(),
            python_path: PathBuf::from("/home/teeapp/python/bin/python3"),
            occlum_python_path: PathBuf::from("/bin/python3"),
            worker_root: PathBuf::from("/home/teeapp"),
            block_length: crate::codec::DEFAULT_BLOCK_LENGTH,
        }
    }
}

impl SidecarConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SidecarError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn task_config_path(&self) -> PathBuf {
        self.task_config_path
            .clone()
            .unwrap_or_else(|| self.task_base_dir.join("task_config.json"))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_image_layout() {
        let cfg = SidecarConfig::default();
        assert_eq!(cfg.task_config_path(), PathBuf::from("/home/teeapp/task/task_config.json"));
        assert_eq!(cfg.rpc_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.block_length, 8192);
        assert_eq!(cfg.tls.ca_cert, PathBuf::from("/host/certs/ca.crt"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"task_base_dir": "/tmp/task", "rpc_timeout_ms": 250}}"#).unwrap();

        let cfg = SidecarConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.task_base_dir, PathBuf::from("/tmp/task"));
        assert_eq!(cfg.task_config_path(), PathBuf::from("/tmp/task/task_config.json"));
        assert_eq!(cfg.rpc_timeout_ms, 250);
        assert_eq!(cfg.python_path, PathBuf::from("/home/teeapp/python/bin/python3"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SidecarConfig::load(Some(Path::new("/nonexistent/sealrun.json"))).unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Io);
    }
}
