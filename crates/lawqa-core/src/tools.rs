//! Tool parameter schemas and the tagged value type checked at dispatch.
//!
//! Tools are registry lookups the synthesised code may call. Their schemas
//! are described here so prompts can render the catalogue and dispatch can
//! validate arguments before any lookup is attempted. The callables live with
//! the registry client (`lawqa-host::tools`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A tool argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    Flag(bool),
    TextList(Vec<String>),
    NumberList(Vec<f64>),
    Record(Map<String, Value>),
    Records(Vec<Map<String, Value>>),
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Text,
    Number,
    Flag,
    TextList,
    NumberList,
    /// Numbers, or amount strings such as `"5千万"`.
    Amounts,
    Record,
    Records,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "str",
            Self::Number => "float",
            Self::Flag => "bool",
            Self::TextList => "list[str]",
            Self::NumberList => "list[float]",
            Self::Amounts => "list[float] | list[str]",
            Self::Record => "dict",
            Self::Records => "list[dict]",
        }
    }

    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Amounts, ParamValue::NumberList(_) | ParamValue::TextList(_)) => true,
            // An empty JSON list carries no item type.
            (Self::NumberList | Self::Records, ParamValue::TextList(v)) => v.is_empty(),
            _ => *self == value.kind(),
        }
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Text(_) => ParamKind::Text,
            Self::Number(_) => ParamKind::Number,
            Self::Flag(_) => ParamKind::Flag,
            Self::TextList(_) => ParamKind::TextList,
            Self::NumberList(_) => ParamKind::NumberList,
            Self::Record(_) => ParamKind::Record,
            Self::Records(_) => ParamKind::Records,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON argument. Nulls and mixed lists are rejected; an empty
    /// list becomes an empty `TextList`.
    pub fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(Self::Text(s)),
            Value::Number(n) => number(&n).map(Self::Number),
            Value::Bool(b) => Ok(Self::Flag(b)),
            Value::Array(items) => match items.first() {
                None | Some(Value::String(_)) => items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s),
                        other => Err(format!("list items must all be text, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::TextList),
                Some(Value::Number(_)) => items
                    .into_iter()
                    .map(|v| match v {
                        Value::Number(n) => number(&n),
                        other => Err(format!("list items must all be numbers, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::NumberList),
                Some(Value::Object(_)) => items
                    .into_iter()
                    .map(|v| match v {
                        Value::Object(map) => Ok(map),
                        other => Err(format!("list items must all be records, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Records),
                Some(other) => Err(format!("unsupported list item {other}")),
            },
            Value::Object(map) => Ok(Self::Record(map)),
            Value::Null => Err("unsupported argument null".to_string()),
        }
    }
}

fn number(n: &serde_json::Number) -> Result<f64, String> {
    n.as_f64().ok_or_else(|| format!("number out of range: {n}"))
}

pub type ToolArgs = BTreeMap<String, ParamValue>;

/// A typed argument error raised at the dispatch boundary.
///
/// Rendered into the sandbox's error taxonomy as `ename = "<tool> 参数错误"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{tool} 参数错误: {message}")]
pub struct ValidationError {
    pub tool: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// `(name, value)` pair in the sandbox error taxonomy.
    pub fn taxonomy(&self) -> (String, String) {
        (format!("{} 参数错误", self.tool), self.message.clone())
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
        }
    }
}

/// Name, description and parameter schema of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    /// Example call shown to the code synthesiser.
    pub example: &'static str,
}

impl ToolSpec {
    /// Check presence, type and emptiness of every declared parameter and
    /// reject undeclared ones.
    pub fn validate(&self, args: &ToolArgs) -> Result<(), ValidationError> {
        for key in args.keys() {
            if !self.params.iter().any(|p| p.name == key) {
                return Err(ValidationError::new(self.name, format!("未知参数 {key}")));
            }
        }
        for param in &self.params {
            match args.get(param.name) {
                None if param.required => {
                    return Err(ValidationError::new(
                        self.name,
                        format!("{} 不能为空", param.name),
                    ));
                }
                None => {}
                Some(value) => {
                    if !param.kind.accepts(value) {
                        return Err(ValidationError::new(
                            self.name,
                            format!("{} 需要 {} 类型", param.name, param.kind.as_str()),
                        ));
                    }
                    // Optional lists may be passed empty.
                    if param.required && is_empty(value) {
                        return Err(ValidationError::new(
                            self.name,
                            format!("{} 不能为空", param.name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ToolSpec {
    /// Catalogue entry in the format the prompts expect.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} 工具", self.name)?;
        writeln!(f, "{}", self.description)?;
        writeln!(f, "Args:")?;
        for p in &self.params {
            let opt = if p.required { "" } else { ", optional" };
            writeln!(f, "    {} ({}{}): {}", p.name, p.kind.as_str(), opt, p.description)?;
        }
        if !self.example.is_empty() {
            writeln!(f, "Example:")?;
            writeln!(f, "    >>> {}", self.example)?;
        }
        write!(f, "-------------------------------------")
    }
}

fn is_empty(value: &ParamValue) -> bool {
    match value {
        ParamValue::Text(s) => s.trim().is_empty(),
        ParamValue::TextList(v) => v.is_empty(),
        ParamValue::NumberList(v) => v.is_empty(),
        ParamValue::Record(m) => m.is_empty(),
        ParamValue::Records(v) => v.is_empty(),
        ParamValue::Number(_) | ParamValue::Flag(_) => false,
    }
}
