//! DomainDataRegistry port - kuscia の domain data サービス
//!
//! Only used in kuscia mode, where every produced artifact is announced to
//! the data mesh before the file lands in shared storage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    /// `id`, `feature` or `label`.
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainData {
    pub domaindata_id: String,
    pub name: String,
    /// `table`, `model`, `rule` or `report`.
    #[serde(rename = "type")]
    pub data_type: String,
    pub relative_uri: String,
    pub datasource_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<DataColumn>,
    pub vendor: String,
}

#[async_trait]
pub trait DomainDataRegistry: Send + Sync {
    /// Returns the id the service assigned.
    async fn create(&self, data: DomainData) -> Result<String>;

    async fn query(&self, domaindata_id: &str) -> Result<Option<DomainData>>;
}
