//! InMemoryDomainDataRegistry - 開発用・テスト用の domain data サービス
//!
//! Records every created `DomainData` so kuscia-mode runs can be exercised
//! without a data mesh.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::errors::{Result, SidecarError};
use crate::ports::{DomainData, DomainDataRegistry};

#[derive(Debug, Clone, Default)]
pub struct InMemoryDomainDataRegistry {
    records: Arc<Mutex<BTreeMap<String, DomainData>>>,
}

impl InMemoryDomainDataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything created so far, ordered by id.
    pub fn records(&self) -> Vec<DomainData> {
        self.records
            .lock()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DomainDataRegistry for InMemoryDomainDataRegistry {
    async fn create(&self, data: DomainData) -> Result<String> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SidecarError::Precondition("domain data registry poisoned".to_string()))?;
        if records.contains_key(&data.domaindata_id) {
            return Err(SidecarError::Service {
                code: 409,
                message: format!("domaindata `{}` already exists", data.domaindata_id),
            });
        }
        let id = data.domaindata_id.clone();
        records.insert(id.clone(), data);
        Ok(id)
    }

    async fn query(&self, domaindata_id: &str) -> Result<Option<DomainData>> {
        let records = self
            .records
            .lock()
            .map_err(|_| SidecarError::Precondition("domain data registry poisoned".to_string()))?;
        Ok(records.get(domaindata_id).cloned())
    }
}
