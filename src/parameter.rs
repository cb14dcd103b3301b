//! Named request parameters and their identity rules.
//!
//! Parameters live in an ordered sequence on the builder with at most one
//! entry per name under case-insensitive comparison. Adding a parameter whose
//! name collides with an existing one replaces the entry in its original
//! position.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a parameter ends up in the materialized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Appended to the query string.
    Query,
    /// Substituted into a `{name}` placeholder in the resource path.
    UrlSegment,
    /// Rendered into a urlencoded form body (or a multipart text part when
    /// file attachments are present).
    Form,
    /// Carried on the request descriptor without affecting the URL or body.
    Generic,
}

/// A parameter value with a stable, locale-independent textual form.
///
/// Rust's `Display` never consults the host locale, so `19.99` renders as
/// `"19.99"` and booleans render as `true`/`false` everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(s) => f.write_str(s),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::Text(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        ParameterValue::Float(v as f64)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

/// A named request parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
        kind: ParameterKind,
    ) -> Self {
        Self { name: name.into(), value: value.into(), kind }
    }

    pub fn query(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new(name, value, ParameterKind::Query)
    }

    pub fn url_segment(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new(name, value, ParameterKind::UrlSegment)
    }

    pub fn form(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new(name, value, ParameterKind::Form)
    }

    pub fn generic(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new(name, value, ParameterKind::Generic)
    }

    /// Case-insensitive name identity shared by the add/remove operations.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
