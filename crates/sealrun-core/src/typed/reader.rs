//! EvalParamReader - job parameters checked against a component definition
//!
//! Construction does all the validation; a reader that exists is known to
//! satisfy the definition, so its getters only fail on kind mismatches
//! (a filler asking for the wrong kind).

use std::collections::{BTreeMap, HashSet};

use crate::domain::errors::{Result, SidecarError};
use crate::domain::job::{Attribute, DistData, JobParams};

use super::component::{AttrDef, AttrKind, AttrValue, ComponentDef};

#[derive(Debug, Clone)]
pub struct EvalParamReader {
    params: JobParams,
    def: ComponentDef,
    attrs: BTreeMap<String, AttrValue>,
    input_columns: BTreeMap<String, Vec<String>>,
}

impl EvalParamReader {
    pub fn new(params: JobParams, def: ComponentDef) -> Result<Self> {
        if (params.domain.as_str(), params.name.as_str(), params.version.as_str())
            != (def.domain, def.name, def.version)
        {
            return Err(SidecarError::schema(format!(
                "job names {} but the definition is {}",
                params.component_key(),
                def.key()
            )));
        }
        if params.attr_paths.len() != params.attrs.len() {
            return Err(SidecarError::schema(format!(
                "{} attr_paths but {} attrs",
                params.attr_paths.len(),
                params.attrs.len()
            )));
        }

        let mut provided: BTreeMap<&str, &Attribute> = BTreeMap::new();
        for (path, attr) in params.attr_paths.iter().zip(&params.attrs) {
            if provided.contains_key(path.as_str()) {
                return Err(SidecarError::schema(format!("duplicate attr path `{path}`")));
            }
            if !attr.is_na {
                provided.insert(path.as_str(), attr);
            }
        }

        let mut attrs = BTreeMap::new();
        for attr_def in &def.attrs {
            let full_name = attr_def.full_name();
            let value = match provided.get(full_name.as_str()) {
                Some(attr) => Some(convert(attr_def, attr)),
                None => attr_def.default.clone(),
            };
            let Some(value) = value else {
                if attr_def.optional {
                    continue;
                }
                return Err(SidecarError::schema(format!("attr `{full_name}` is required")));
            };
            attr_def.check(&value).map_err(SidecarError::Schema)?;
            attrs.insert(full_name, value);
        }

        if params.inputs.len() != def.inputs.len() {
            return Err(SidecarError::schema(format!(
                "{} expects {} inputs, got {}",
                def.key(),
                def.inputs.len(),
                params.inputs.len()
            )));
        }
        let mut input_columns = BTreeMap::new();
        for (input, input_def) in params.inputs.iter().zip(&def.inputs) {
            if !input_def.types.iter().any(|t| *t == input.data_type) {
                return Err(SidecarError::schema(format!(
                    "input `{}` has type {}, expected one of {:?}",
                    input_def.name, input.data_type, input_def.types
                )));
            }
            for col in &input_def.columns {
                let full_name = input_def.column_attr_name(col.name);
                let selected = provided
                    .get(full_name.as_str())
                    .map(|a| a.ss.clone())
                    .unwrap_or_default();
                col.check(&full_name, selected.len()).map_err(SidecarError::Schema)?;
                input_columns.insert(full_name, selected);
            }
        }

        if params.output_uris.len() != def.outputs.len() {
            return Err(SidecarError::schema(format!(
                "{} expects {} outputs, got {}",
                def.key(),
                def.outputs.len(),
                params.output_uris.len()
            )));
        }

        let known: HashSet<String> = def
            .attrs
            .iter()
            .map(AttrDef::full_name)
            .chain(input_columns.keys().cloned())
            .collect();
        if let Some(unknown) = provided.keys().find(|p| !known.contains(**p)) {
            return Err(SidecarError::schema(format!("unknown attr path `{unknown}`")));
        }

        Ok(Self {
            params,
            def,
            attrs,
            input_columns,
        })
    }

    pub fn definition(&self) -> &ComponentDef {
        &self.def
    }

    pub fn inputs(&self) -> &[DistData] {
        &self.params.inputs
    }

    pub fn output_uris(&self) -> &[String] {
        &self.params.output_uris
    }

    /// Resolved value of every declared attribute that has one, by full name.
    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.attr(name) {
            Some(AttrValue::Float(f)) => Ok(*f),
            other => Err(mismatch(name, AttrKind::Float, other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.attr(name) {
            Some(AttrValue::Int(i)) => Ok(*i),
            other => Err(mismatch(name, AttrKind::Int, other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.attr(name) {
            Some(AttrValue::Str(s)) => Ok(s),
            other => Err(mismatch(name, AttrKind::Str, other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.attr(name) {
            Some(AttrValue::Bool(b)) => Ok(*b),
            other => Err(mismatch(name, AttrKind::Bool, other)),
        }
    }

    /// Unset optional lists read as empty.
    pub fn get_strings(&self, name: &str) -> Result<&[String]> {
        match self.attr(name) {
            Some(AttrValue::Strings(ss)) => Ok(ss),
            None => Ok(&[]),
            other => Err(mismatch(name, AttrKind::Strings, other)),
        }
    }

    /// Columns selected for `column` on input `input`.
    pub fn input_columns(&self, input: &str, column: &str) -> &[String] {
        self.input_columns
            .get(&format!("input/{input}/{column}"))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn convert(def: &AttrDef, attr: &Attribute) -> AttrValue {
    match def.kind {
        AttrKind::Float => AttrValue::Float(attr.f),
        AttrKind::Int => AttrValue::Int(attr.i64),
        AttrKind::Str => AttrValue::Str(attr.s.clone()),
        AttrKind::Bool => AttrValue::Bool(attr.b),
        AttrKind::Floats => AttrValue::Floats(attr.fs.clone()),
        AttrKind::Ints => AttrValue::Ints(attr.i64s.clone()),
        AttrKind::Strings => AttrValue::Strings(attr.ss.clone()),
        AttrKind::Bools => AttrValue::Bools(attr.bs.clone()),
    }
}

fn mismatch(name: &str, want: AttrKind, got: Option<&AttrValue>) -> SidecarError {
    SidecarError::schema(format!(
        "attr `{name}` read as {want:?}, holds {:?}",
        got.map(AttrValue::kind)
    ))
}
