//! Data uri parsing.
//!
//! Inputs and outputs are addressed with query-style uris such as
//! `kuscia://input/?id=t1&&uri=alice/t1.csv`. Only the part after `?` matters.

use std::collections::HashMap;

use super::errors::{Result, SidecarError};
use super::platform::AppMode;

const ID: &str = "id";
const URI: &str = "uri";
const DATASOURCE_ID: &str = "datasource_id";

fn query_params(raw: &str) -> Result<HashMap<&str, &str>> {
    let (_, query) = raw
        .split_once('?')
        .ok_or_else(|| SidecarError::format(format!("can not find ? in uri: {raw}")))?;
    Ok(query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.split_once('=').unwrap_or((segment, "")))
        .collect())
}

fn required<'a>(params: &HashMap<&str, &'a str>, key: &str, raw: &str) -> Result<&'a str> {
    params
        .get(key)
        .copied()
        .ok_or_else(|| SidecarError::format(format!("can not find {key} in {raw}")))
}

/// Input reference: data uuid plus where its ciphertext lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUri {
    pub id: String,
    pub uri: String,
}

impl InputUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let params = query_params(raw)?;
        Ok(Self {
            id: required(&params, ID, raw)?.to_string(),
            uri: required(&params, URI, raw)?.to_string(),
        })
    }
}

/// Output reference. `datasource_id` is present only for data-mesh outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUri {
    pub datasource_id: Option<String>,
    pub id: String,
    pub uri: String,
}

impl OutputUri {
    pub fn parse_local(raw: &str) -> Result<Self> {
        let params = query_params(raw)?;
        Ok(Self {
            datasource_id: None,
            id: required(&params, ID, raw)?.to_string(),
            uri: required(&params, URI, raw)?.to_string(),
        })
    }

    pub fn parse_data_mesh(raw: &str) -> Result<Self> {
        let params = query_params(raw)?;
        Ok(Self {
            datasource_id: Some(required(&params, DATASOURCE_ID, raw)?.to_string()),
            id: required(&params, ID, raw)?.to_string(),
            uri: required(&params, URI, raw)?.to_string(),
        })
    }

    pub fn parse(raw: &str, mode: AppMode) -> Result<Self> {
        match mode {
            AppMode::Local => Self::parse_local(raw),
            AppMode::Kuscia => Self::parse_data_mesh(raw),
        }
    }
}
