//! Output artifacts - metadata と公開
//!
//! Each declared output becomes an [`OutputArtifact`] during pre-processing.
//! After the worker ran, tables get their schema from the `.schema` file the
//! worker wrote; models, rules and reports carry no metadata. In kuscia mode
//! the metadata is announced as a [`DomainData`] record.

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::errors::{Result, SidecarError};
use crate::domain::job::{DataRef, DistData, DistMeta, TableSchema, dist_data_type};
use crate::domain::uri::OutputUri;
use crate::ports::{DataColumn, DomainData};
use crate::typed::{OutputDef, OutputPaths};

pub const VENDOR: &str = "teeapps";
pub const SOURCE_TEE: &str = "tee";
const INDIVIDUAL_TABLE_TYPE_URL: &str = "type.googleapis.com/secretflow.spec.v1.IndividualTable";

/// One declared output: where the worker writes it and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Declared output name, e.g. `train`.
    pub name: &'static str,
    pub data_type: &'static str,
    pub uri: OutputUri,
    pub paths: OutputPaths,
}

impl OutputArtifact {
    pub fn new(def: &OutputDef, uri: OutputUri, paths: OutputPaths) -> Self {
        Self {
            name: def.name,
            data_type: def.primary_type(),
            uri,
            paths,
        }
    }

    pub fn id(&self) -> &str {
        &self.uri.id
    }

    /// Reports are published as plaintext.
    pub fn is_report(&self) -> bool {
        self.data_type == dist_data_type::REPORT
    }

    pub fn is_table(&self) -> bool {
        self.data_type == dist_data_type::INDIVIDUAL_TABLE
    }

    pub fn dist_data(&self) -> Result<DistData> {
        let meta = if self.is_table() {
            Some(DistMeta {
                type_url: Some(INDIVIDUAL_TABLE_TYPE_URL.to_string()),
                schema: Some(read_schema(&self.paths.schema_path)?),
            })
        } else {
            None
        };
        Ok(DistData {
            name: self.name.to_string(),
            data_type: self.data_type.to_string(),
            meta,
            data_refs: vec![DataRef {
                uri: self.uri.uri.clone(),
                ..DataRef::default()
            }],
        })
    }

    /// Data-mesh record for this output. The full `DistData` travels as JSON
    /// in the `dist_data` attribute.
    pub fn domain_data(&self) -> Result<DomainData> {
        let datasource_id = self.uri.datasource_id.clone().ok_or_else(|| {
            SidecarError::format(format!("output `{}` has no datasource_id", self.uri.id))
        })?;
        let dist = self.dist_data()?;
        let columns = dist.table_schema().map(data_columns).unwrap_or_default();

        let mut attributes = BTreeMap::new();
        attributes.insert("source".to_string(), SOURCE_TEE.to_string());
        attributes.insert("dist_data".to_string(), serde_json::to_string(&dist)?);

        Ok(DomainData {
            domaindata_id: self.uri.id.clone(),
            name: dist.name,
            data_type: domain_data_type(self.data_type)?.to_string(),
            relative_uri: self.uri.uri.clone(),
            datasource_id,
            attributes,
            columns,
            vendor: VENDOR.to_string(),
        })
    }
}

/// `sf.table.individual` → `table`, `sf.model.xgb` → `model`, ...
pub fn domain_data_type(dist_type: &str) -> Result<&'static str> {
    ["table", "model", "rule", "report"]
        .into_iter()
        .find(|kind| dist_type.contains(kind))
        .ok_or_else(|| {
            SidecarError::unsupported(format!("can not convert DistData type {dist_type} to DomainData type"))
        })
}

fn data_columns(schema: &TableSchema) -> Vec<DataColumn> {
    let group = |names: &[String], types: &[String], comment: &str| {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| DataColumn {
                name: name.clone(),
                column_type: types.get(i).cloned().unwrap_or_default(),
                comment: comment.to_string(),
            })
            .collect::<Vec<_>>()
    };
    let mut columns = group(&schema.ids, &schema.id_types, "id");
    columns.extend(group(&schema.features, &schema.feature_types, "feature"));
    columns.extend(group(&schema.labels, &schema.label_types, "label"));
    columns
}

fn read_schema(path: &Path) -> Result<TableSchema> {
    let raw = std::fs::read_to_string(path).map_err(|e| SidecarError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Copy `src` to `dst`, creating the destination directory.
pub fn copy_artifact(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SidecarError::io(parent, e))?;
    }
    std::fs::copy(src, dst).map_err(|e| SidecarError::io(src, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::domain::platform::AppMode;
    use rstest::rstest;

    fn artifact(dir: &Path, def: OutputDef, raw_uri: &str) -> OutputArtifact {
        let uri = OutputUri::parse(raw_uri, AppMode::Kuscia).unwrap();
        let paths = OutputPaths {
            data_path: dir.join(format!("{}.dat", uri.id)),
            schema_path: dir.join(format!("{}.schema", uri.id)),
        };
        OutputArtifact::new(&def, uri, paths)
    }

    #[rstest]
    #[case(dist_data_type::INDIVIDUAL_TABLE, "table")]
    #[case(dist_data_type::XGB_MODEL, "model")]
    #[case(dist_data_type::LGBM_MODEL, "model")]
    #[case(dist_data_type::WOE_RUNNING_RULE, "rule")]
    #[case(dist_data_type::REPORT, "report")]
    fn dist_types_map_to_domain_types(#[case] dist: &str, #[case] expected: &str) {
        assert_eq!(domain_data_type(dist).unwrap(), expected);
    }

    #[test]
    fn unknown_dist_type_is_unsupported() {
        assert_eq!(domain_data_type("sf.blob").unwrap_err().kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn table_output_carries_schema_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let out = artifact(
            dir.path(),
            OutputDef::new("train", &[dist_data_type::INDIVIDUAL_TABLE]),
            "dm://output/?datasource_id=ds1&&id=o1&&uri=alice/train.csv",
        );
        std::fs::write(
            &out.paths.schema_path,
            r#"{"ids":["id"],"id_types":["str"],"features":["x1","x2"],"feature_types":["float","float"],"labels":["y"],"label_types":["int"]}"#,
        )
        .unwrap();

        let record = out.domain_data().unwrap();
        assert_eq!(record.domaindata_id, "o1");
        assert_eq!(record.name, "train");
        assert_eq!(record.data_type, "table");
        assert_eq!(record.relative_uri, "alice/train.csv");
        assert_eq!(record.datasource_id, "ds1");
        assert_eq!(record.vendor, "teeapps");
        assert_eq!(record.attributes["source"], "tee");

        let comments: Vec<_> = record.columns.iter().map(|c| c.comment.as_str()).collect();
        assert_eq!(comments, ["id", "feature", "feature", "label"]);
        assert_eq!(record.columns[3].column_type, "int");

        let dist: DistData = serde_json::from_str(&record.attributes["dist_data"]).unwrap();
        assert_eq!(dist.table_schema().unwrap().features, ["x1", "x2"]);
        assert_eq!(dist.data_refs[0].uri, "alice/train.csv");
    }

    #[test]
    fn model_output_has_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let out = artifact(
            dir.path(),
            OutputDef::new("output_model", &[dist_data_type::XGB_MODEL]),
            "dm://output/?datasource_id=ds1&&id=m1&&uri=alice/model",
        );
        let dist = out.dist_data().unwrap();
        assert!(dist.meta.is_none());
        let record = out.domain_data().unwrap();
        assert!(record.columns.is_empty());
        assert_eq!(record.data_type, "model");
    }

    #[test]
    fn table_without_schema_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = artifact(
            dir.path(),
            OutputDef::new("pred", &[dist_data_type::INDIVIDUAL_TABLE]),
            "dm://output/?datasource_id=ds1&&id=p1&&uri=alice/pred.csv",
        );
        assert_eq!(out.dist_data().unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn copy_creates_destination_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("o1.dat");
        std::fs::write(&src, b"ciphertext").unwrap();
        let dst = dir.path().join("shared/alice/o1.csv");
        assert_eq!(copy_artifact(&src, &dst).unwrap(), 10);
        assert_eq!(std::fs::read(&dst).unwrap(), b"ciphertext");
    }
}
