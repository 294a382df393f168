//! Component trait - 型付き component の定義
//!
//! A component is one worker script plus the declaration of what it
//! accepts: attributes with defaults and bounds, typed inputs with column
//! selections, and typed outputs. `EvalParamReader` checks job parameters
//! against that declaration before anything is decrypted.

use std::fmt;

use serde_json::Value;

/// Component は (domain, name, version) と worker script を対応付ける
///
/// ```ignore
/// struct Psi;
///
/// impl Component for Psi {
///     const DOMAIN: &'static str = "preprocessing";
///     const NAME: &'static str = "psi";
///     const VERSION: &'static str = "0.0.1";
///     const WORKER_SCRIPT: &'static str = "psi.py";
///
///     fn definition() -> ComponentDef { ... }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    const DOMAIN: &'static str;
    const NAME: &'static str;
    const VERSION: &'static str;
    /// File name of the worker script, relative to the platform's script dir.
    const WORKER_SCRIPT: &'static str;

    fn definition() -> ComponentDef;

    /// `<domain>/<name>:<version>`
    fn key() -> String {
        crate::domain::job::component_key(Self::DOMAIN, Self::NAME, Self::VERSION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Float,
    Int,
    Str,
    Bool,
    Floats,
    Ints,
    Strings,
    Bools,
}

/// A resolved attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Str(String),
    Bool(bool),
    Floats(Vec<f64>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
    Bools(Vec<bool>),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Str(_) => AttrKind::Str,
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Floats(_) => AttrKind::Floats,
            AttrValue::Ints(_) => AttrKind::Ints,
            AttrValue::Strings(_) => AttrKind::Strings,
            AttrValue::Bools(_) => AttrKind::Bools,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Float(f) => Value::from(*f),
            AttrValue::Int(i) => Value::from(*i),
            AttrValue::Str(s) => Value::from(s.as_str()),
            AttrValue::Bool(b) => Value::from(*b),
            AttrValue::Floats(fs) => Value::from(fs.clone()),
            AttrValue::Ints(is) => Value::from(is.clone()),
            AttrValue::Strings(ss) => Value::from(ss.clone()),
            AttrValue::Bools(bs) => Value::from(bs.clone()),
        }
    }

    /// Numeric content; list bounds apply to every element.
    fn numbers(&self) -> Vec<f64> {
        match self {
            AttrValue::Float(f) => vec![*f],
            AttrValue::Int(i) => vec![*i as f64],
            AttrValue::Floats(fs) => fs.clone(),
            AttrValue::Ints(is) => is.iter().map(|i| *i as f64).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Numeric bound; `inclusive` decides whether the bound itself is allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    /// Path segments before the name, e.g. `["input", "train"]`.
    pub prefixes: Vec<&'static str>,
    pub name: &'static str,
    pub kind: AttrKind,
    /// `None` makes the attribute required unless `optional` is set.
    pub default: Option<AttrValue>,
    pub optional: bool,
    pub allowed: Vec<&'static str>,
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl AttrDef {
    fn new(name: &'static str, kind: AttrKind, default: Option<AttrValue>) -> Self {
        Self {
            prefixes: Vec::new(),
            name,
            kind,
            default,
            optional: false,
            allowed: Vec::new(),
            lower: None,
            upper: None,
        }
    }

    pub fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, AttrKind::Float, Some(AttrValue::Float(default)))
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, AttrKind::Int, Some(AttrValue::Int(default)))
    }

    pub fn string(name: &'static str, default: &str) -> Self {
        Self::new(name, AttrKind::Str, Some(AttrValue::Str(default.to_string())))
    }

    pub fn boolean(name: &'static str, default: bool) -> Self {
        Self::new(name, AttrKind::Bool, Some(AttrValue::Bool(default)))
    }

    /// String list that may be left unset.
    pub fn strings(name: &'static str) -> Self {
        Self::new(name, AttrKind::Strings, None).optional()
    }

    pub fn floats(name: &'static str) -> Self {
        Self::new(name, AttrKind::Floats, None).optional()
    }

    pub fn ints(name: &'static str) -> Self {
        Self::new(name, AttrKind::Ints, None).optional()
    }

    pub fn bools(name: &'static str) -> Self {
        Self::new(name, AttrKind::Bools, None).optional()
    }

    /// Drop the default; the job must supply a value.
    pub fn required(mut self) -> Self {
        self.default = None;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn allowed(mut self, values: &[&'static str]) -> Self {
        self.allowed = values.to_vec();
        self
    }

    pub fn lower(mut self, value: f64, inclusive: bool) -> Self {
        self.lower = Some(Bound { value, inclusive });
        self
    }

    pub fn upper(mut self, value: f64, inclusive: bool) -> Self {
        self.upper = Some(Bound { value, inclusive });
        self
    }

    pub fn under(mut self, prefixes: &[&'static str]) -> Self {
        self.prefixes = prefixes.to_vec();
        self
    }

    /// Prefixes and name joined with `/`.
    pub fn full_name(&self) -> String {
        let mut parts = self.prefixes.clone();
        parts.push(self.name);
        parts.join("/")
    }

    /// Range and allowed-value checks. Returns a message on violation.
    pub fn check(&self, value: &AttrValue) -> Result<(), String> {
        let name = self.full_name();
        if !self.allowed.is_empty() {
            let candidates: Vec<&str> = match value {
                AttrValue::Str(s) => vec![s.as_str()],
                AttrValue::Strings(ss) => ss.iter().map(String::as_str).collect(),
                _ => Vec::new(),
            };
            if let Some(bad) = candidates
                .into_iter()
                .find(|c| !self.allowed.iter().any(|a| a == c))
            {
                return Err(format!(
                    "attr `{name}`: `{bad}` is not one of {:?}",
                    self.allowed
                ));
            }
        }
        for n in value.numbers() {
            if let Some(b) = self.lower {
                let ok = if b.inclusive { n >= b.value } else { n > b.value };
                if !ok {
                    let op = if b.inclusive { ">=" } else { ">" };
                    return Err(format!("attr `{name}`: {n} must be {op} {}", b.value));
                }
            }
            if let Some(b) = self.upper {
                let ok = if b.inclusive { n <= b.value } else { n < b.value };
                if !ok {
                    let op = if b.inclusive { "<=" } else { "<" };
                    return Err(format!("attr `{name}`: {n} must be {op} {}", b.value));
                }
            }
        }
        Ok(())
    }
}

/// Column selection an input declares, e.g. `label` with exactly one column.
/// A bound of 0 means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub min: usize,
    pub max: usize,
}

impl ColumnDef {
    pub fn new(name: &'static str, min: usize, max: usize) -> Self {
        Self { name, min, max }
    }

    pub fn check(&self, full_name: &str, count: usize) -> Result<(), String> {
        if self.min > 0 && count < self.min {
            return Err(format!(
                "`{full_name}` selects {count} columns, at least {} required",
                self.min
            ));
        }
        if self.max > 0 && count > self.max {
            return Err(format!(
                "`{full_name}` selects {count} columns, at most {} allowed",
                self.max
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDef {
    pub name: &'static str,
    pub types: Vec<&'static str>,
    pub columns: Vec<ColumnDef>,
}

impl InputDef {
    pub fn new(name: &'static str, types: &[&'static str]) -> Self {
        Self {
            name,
            types: types.to_vec(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: &'static str, min: usize, max: usize) -> Self {
        self.columns.push(ColumnDef::new(name, min, max));
        self
    }

    /// `input/<input>/<column attr>`
    pub fn column_attr_name(&self, column: &str) -> String {
        format!("input/{}/{column}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDef {
    pub name: &'static str,
    pub types: Vec<&'static str>,
}

impl OutputDef {
    pub fn new(name: &'static str, types: &[&'static str]) -> Self {
        Self {
            name,
            types: types.to_vec(),
        }
    }

    /// Declared type written into output metadata.
    pub fn primary_type(&self) -> &'static str {
        self.types.first().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDef {
    pub domain: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub attrs: Vec<AttrDef>,
    pub inputs: Vec<InputDef>,
    pub outputs: Vec<OutputDef>,
}

impl ComponentDef {
    pub fn new(domain: &'static str, name: &'static str, version: &'static str) -> Self {
        Self {
            domain,
            name,
            version,
            attrs: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn attr(mut self, attr: AttrDef) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn input(mut self, input: InputDef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: OutputDef) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn key(&self) -> String {
        crate::domain::job::component_key(self.domain, self.name, self.version)
    }
}
