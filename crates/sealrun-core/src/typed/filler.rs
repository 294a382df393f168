//! Filler trait - worker 用 task config の生成
//!
//! # 二層構造
//! - `Filler<C>`: component ごとの型付き filler
//! - `DynFiller`: object-safe, `ComponentRegistry` に格納する側
//!
//! `TypedFiller<C, F>` が `Filler<C>` を `DynFiller` に型消去する。

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::domain::errors::{Result, SidecarError};

use super::component::{Component, ComponentDef};
use super::reader::EvalParamReader;

/// Where the worker writes one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub data_path: PathBuf,
    pub schema_path: PathBuf,
}

/// Validated parameters plus the local file locations the worker sees.
#[derive(Debug, Clone, Copy)]
pub struct FillContext<'a> {
    pub reader: &'a EvalParamReader,
    /// Decrypted input files, in declaration order.
    pub input_paths: &'a [PathBuf],
    pub outputs: &'a [OutputPaths],
}

/// Produces the task-config document for component `C`.
pub trait Filler<C: Component>: Send + Sync {
    fn fill(&self, ctx: &FillContext<'_>) -> Result<Value>;
}

/// Object-safe filler.
pub trait DynFiller: Send + Sync {
    fn fill_dyn(&self, ctx: &FillContext<'_>) -> Result<Value>;
    fn definition(&self) -> &ComponentDef;
    fn worker_script(&self) -> &'static str;
    fn component_key(&self) -> String;
}

pub struct TypedFiller<C: Component, F: Filler<C>> {
    filler: F,
    def: ComponentDef,
    _marker: PhantomData<C>,
}

impl<C: Component, F: Filler<C>> TypedFiller<C, F> {
    pub fn new(filler: F) -> Self {
        Self {
            filler,
            def: C::definition(),
            _marker: PhantomData,
        }
    }
}

impl<C: Component, F: Filler<C>> DynFiller for TypedFiller<C, F> {
    fn fill_dyn(&self, ctx: &FillContext<'_>) -> Result<Value> {
        self.filler.fill(ctx)
    }

    fn definition(&self) -> &ComponentDef {
        &self.def
    }

    fn worker_script(&self) -> &'static str {
        C::WORKER_SCRIPT
    }

    fn component_key(&self) -> String {
        C::key()
    }
}

/// Filler driven entirely by the component definition:
///
/// ```text
/// { "component_name": <name>, <attr>: <value>...,
///   "inputs":  [{ "data_path", "schema"?, <column attr>: [...] }],
///   "outputs": [{ "data_path", "data_schema_path" }] }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFiller;

impl<C: Component> Filler<C> for StandardFiller {
    fn fill(&self, ctx: &FillContext<'_>) -> Result<Value> {
        standard_document(C::NAME, ctx)
    }
}

pub fn standard_document(component_name: &str, ctx: &FillContext<'_>) -> Result<Value> {
    let reader = ctx.reader;
    let def = reader.definition();
    if ctx.input_paths.len() != def.inputs.len() {
        return Err(SidecarError::Precondition(format!(
            "{} input paths for {} declared inputs",
            ctx.input_paths.len(),
            def.inputs.len()
        )));
    }
    if ctx.outputs.len() != def.outputs.len() {
        return Err(SidecarError::Precondition(format!(
            "{} output paths for {} declared outputs",
            ctx.outputs.len(),
            def.outputs.len()
        )));
    }

    let mut doc = Map::new();
    doc.insert("component_name".into(), Value::from(component_name));
    for (name, value) in reader.attrs() {
        doc.insert(name.clone(), value.to_json());
    }

    let mut inputs = Vec::with_capacity(def.inputs.len());
    for ((input, input_def), path) in reader.inputs().iter().zip(&def.inputs).zip(ctx.input_paths) {
        let mut entry = Map::new();
        entry.insert("data_path".into(), Value::from(path.to_string_lossy().into_owned()));
        if let Some(schema) = input.table_schema() {
            entry.insert("schema".into(), serde_json::to_value(schema)?);
        }
        for col in &input_def.columns {
            let selected = reader.input_columns(input_def.name, col.name).to_vec();
            entry.insert(col.name.into(), Value::from(selected));
        }
        inputs.push(Value::Object(entry));
    }
    doc.insert("inputs".into(), Value::Array(inputs));

    let outputs = ctx
        .outputs
        .iter()
        .map(|o| {
            json!({
                "data_path": o.data_path.to_string_lossy(),
                "data_schema_path": o.schema_path.to_string_lossy(),
            })
        })
        .collect();
    doc.insert("outputs".into(), Value::Array(outputs));
    Ok(Value::Object(doc))
}

/// Persist the document as pretty JSON.
pub fn write_task_config(path: &Path, doc: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SidecarError::io(parent, e))?;
    }
    let pretty = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, pretty).map_err(|e| SidecarError::io(path, e))
}
