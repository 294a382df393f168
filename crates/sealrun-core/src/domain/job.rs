//! Job parameters as delivered by the job source.
//!
//! The JSON shapes follow the component-evaluation documents produced by the
//! upstream scheduler (`attr_paths` / `attrs`, `inputs`, `output_uris`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::errors::{Result, SidecarError};

/// Well-known `DistData.type` values.
pub mod dist_data_type {
    pub const VERTICAL_TABLE: &str = "sf.table.vertical_table";
    pub const INDIVIDUAL_TABLE: &str = "sf.table.individual";
    pub const LR_MODEL: &str = "sf.model.lr";
    pub const XGB_MODEL: &str = "sf.model.xgb";
    pub const LGBM_MODEL: &str = "sf.model.lgbm";
    pub const WOE_RUNNING_RULE: &str = "sf.rule.woe_binning";
    pub const REPORT: &str = "sf.report";
}

/// One attribute value. Only the field matching the declared type is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub f: f64,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "is_zero_i64")]
    pub i64: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub s: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub b: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fs: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_i64s", skip_serializing_if = "Vec::is_empty")]
    pub i64s: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ss: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bs: Vec<bool>,
    /// Explicitly "not set"; the declared default applies.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_na: bool,
}

impl Attribute {
    pub fn float(f: f64) -> Self {
        Self { f, ..Self::default() }
    }

    pub fn int(i64: i64) -> Self {
        Self { i64, ..Self::default() }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self { s: s.into(), ..Self::default() }
    }

    pub fn boolean(b: bool) -> Self {
        Self { b, ..Self::default() }
    }

    pub fn strings<I, S>(ss: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ss: ss.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

// Protobuf JSON renders 64-bit integers as strings; accept both forms.
#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_i64<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            IntOrString::Int(v) => Ok(v),
            IntOrString::Str(s) => s.parse().map_err(E::custom),
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    IntOrString::deserialize(d)?.into_i64()
}

fn lenient_i64s<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<i64>, D::Error> {
    Vec::<IntOrString>::deserialize(d)?
        .into_iter()
        .map(IntOrString::into_i64)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub id_types: Vec<String>,
    #[serde(default)]
    pub feature_types: Vec<String>,
    #[serde(default)]
    pub label_types: Vec<String>,
}

impl TableSchema {
    /// ids, then features, then labels.
    pub fn columns(&self) -> Vec<String> {
        self.ids
            .iter()
            .chain(&self.features)
            .chain(&self.labels)
            .cloned()
            .collect()
    }
}

/// Metadata carried by a `DistData`. Only tables have a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistMeta {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub type_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRef {
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub party: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistData {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DistMeta>,
    #[serde(default)]
    pub data_refs: Vec<DataRef>,
}

impl DistData {
    pub fn is_individual_table(&self) -> bool {
        self.data_type == dist_data_type::INDIVIDUAL_TABLE
    }

    pub fn is_report(&self) -> bool {
        self.data_type == dist_data_type::REPORT
    }

    pub fn table_schema(&self) -> Option<&TableSchema> {
        self.meta.as_ref().and_then(|m| m.schema.as_ref())
    }

    /// The single data reference every supported type carries.
    ///
    /// Vertical tables span several parties and are rejected here.
    pub fn single_ref(&self) -> Result<&DataRef> {
        if self.data_type == dist_data_type::VERTICAL_TABLE {
            return Err(SidecarError::unsupported(format!(
                "input `{}`: vertical tables are not handled inside the enclave",
                self.name
            )));
        }
        match self.data_refs.as_slice() {
            [only] => Ok(only),
            refs => Err(SidecarError::schema(format!(
                "input `{}` ({}) must have exactly one data_ref, got {}",
                self.name,
                self.data_type,
                refs.len()
            ))),
        }
    }
}

/// Evaluation parameters of one component invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub domain: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub attr_paths: Vec<String>,
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    #[serde(default)]
    pub inputs: Vec<DistData>,
    #[serde(default)]
    pub output_uris: Vec<String>,
}

impl JobParams {
    /// `<domain>/<name>:<version>`, the key components are registered under.
    pub fn component_key(&self) -> String {
        component_key(&self.domain, &self.name, &self.version)
    }
}

pub fn component_key(domain: &str, name: &str, version: &str) -> String {
    format!("{domain}/{name}:{version}")
}

/// Task metadata signed by the task initiator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeeTaskConfig {
    #[serde(default)]
    pub task_initiator_id: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub capsule_manager_endpoint: String,
    #[serde(default)]
    pub task_initiator_certs: Vec<String>,
    #[serde(default)]
    pub sign_algorithm: String,
    #[serde(default)]
    pub signature: String,
    /// Standard base64 of the JSON-encoded `JobParams`.
    #[serde(default)]
    pub task_body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalFsConfig {
    pub wd: String,
}

/// Shared storage the orchestrator mounts for inputs and outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_fs: Option<LocalFsConfig>,
}

impl StorageConfig {
    pub const LOCAL_FS: &'static str = "local_fs";

    pub fn local(wd: impl Into<String>) -> Self {
        Self {
            storage_type: Self::LOCAL_FS.to_string(),
            local_fs: Some(LocalFsConfig { wd: wd.into() }),
        }
    }

    /// Resolve a storage-relative uri to a path on the mounted file system.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        match (self.storage_type.as_str(), &self.local_fs) {
            (Self::LOCAL_FS, Some(fs)) => Ok(Path::new(&fs.wd).join(relative)),
            (other, _) => Err(SidecarError::unsupported(format!(
                "storage type `{other}` not support"
            ))),
        }
    }
}

/// Everything a job source hands to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct JobDescriptor {
    pub params: JobParams,
    pub task: TeeTaskConfig,
    pub storage: Option<StorageConfig>,
}
