//! TaskLayout - scratch directory の配置
//!
//! ```text
//! <base>/<id>.dat              decrypted input / plaintext output
//! <base>/<id>.schema           table schema the worker writes for an output
//! <base>/<name>.encrypted.tmp  ciphertext copied in before decryption
//! ```

use std::path::{Path, PathBuf};

use crate::domain::errors::{Result, SidecarError};
use crate::typed::OutputPaths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLayout {
    base: PathBuf,
}

impl TaskLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base).map_err(|e| SidecarError::io(&self.base, e))
    }

    pub fn data_path(&self, id: &str) -> PathBuf {
        self.base.join(format!("{id}.dat"))
    }

    pub fn schema_path(&self, id: &str) -> PathBuf {
        self.base.join(format!("{id}.schema"))
    }

    pub fn encrypted_tmp(&self, name: &str) -> PathBuf {
        self.base.join(format!("{name}.encrypted.tmp"))
    }

    pub fn output_paths(&self, id: &str) -> OutputPaths {
        OutputPaths {
            data_path: self.data_path(id),
            schema_path: self.schema_path(id),
        }
    }
}
