//! Columnar dataset handed to the grid by its host

use std::fmt;
use std::sync::Arc;

use crate::error::GridError;
use super::display::{CellDisplayMode, DataLink, Justify, Threshold};

/// A raw cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Milliseconds since the unix epoch
    Time(i64),
    /// Sub-tables attached to a row of a nested-table field
    Frames(Vec<Arc<DataFrame>>),
}

/// Hashable identity of a raw value.
///
/// Two values share a key when they are the same value under SameValueZero:
/// every NaN is one key and `-0.0` collapses onto `0.0`. Sub-tables compare by
/// allocation, never by content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Number(u64),
    Time(i64),
    Text(String),
    Frames(Vec<usize>),
}

impl Value {
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Number(n) => {
                let canonical = if n.is_nan() {
                    f64::NAN
                } else if *n == 0.0 {
                    0.0
                } else {
                    *n
                };
                ValueKey::Number(canonical.to_bits())
            }
            Value::Time(t) => ValueKey::Time(*t),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Frames(frames) => {
                ValueKey::Frames(frames.iter().map(|f| Arc::as_ptr(f) as usize).collect())
            }
        }
    }

    /// Null and NaN are both "missing" for reducers
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Time(t) => Some(*t as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_frames(&self) -> &[Arc<DataFrame>] {
        match self {
            Value::Frames(frames) => frames,
            _ => &[],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Time(t) => write!(f, "{}", t),
            Value::Frames(frames) => write!(f, "[{} tables]", frames.len()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Time,
    Number,
    String,
    Boolean,
    Other,
    NestedTable,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number)
    }
}

/// Per-field options supplied by the host
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfig {
    pub display_name: Option<String>,
    pub filterable: bool,
    pub sortable: bool,
    /// Fixed column width; columns without one share the leftover space
    pub width: Option<f32>,
    pub min_width: Option<f32>,
    pub align: Justify,
    pub display_mode: CellDisplayMode,
    pub case_sensitive_sort: bool,
    pub decimals: Option<usize>,
    pub unit: Option<String>,
    pub thresholds: Vec<Threshold>,
    pub links: Vec<DataLink>,
    pub hidden: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            filterable: true,
            sortable: true,
            width: None,
            min_width: None,
            align: Justify::Auto,
            display_mode: CellDisplayMode::Auto,
            case_sensitive_sort: false,
            decimals: None,
            unit: None,
            thresholds: Vec::new(),
            links: Vec::new(),
            hidden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub values: Vec<Value>,
    pub config: FieldConfig,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType, values: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            values,
            config: FieldConfig::default(),
        }
    }

    pub fn numbers(name: &str, values: &[f64]) -> Self {
        Self::new(name, FieldType::Number, values.iter().map(|&n| Value::Number(n)).collect())
    }

    pub fn strings(name: &str, values: &[&str]) -> Self {
        Self::new(name, FieldType::String, values.iter().map(|&s| Value::from(s)).collect())
    }

    pub fn times(name: &str, values: &[i64]) -> Self {
        Self::new(name, FieldType::Time, values.iter().map(|&t| Value::Time(t)).collect())
    }

    pub fn nested(name: &str, values: Vec<Vec<DataFrame>>) -> Self {
        Self::new(
            name,
            FieldType::NestedTable,
            values.into_iter()
                .map(|frames| Value::Frames(frames.into_iter().map(Arc::new).collect()))
                .collect(),
        )
    }

    pub fn with_config(mut self, config: FieldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, row: usize) -> &Value {
        self.values.get(row).unwrap_or(&Value::Null)
    }

    /// Header label: configured display name, falling back to the field name
    pub fn display_name(&self) -> &str {
        self.config.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Smallest and largest finite numeric value, if any
    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        self.values.iter()
            .filter_map(|v| v.as_f64())
            .filter(|n| n.is_finite())
            .fold(None, |acc, n| match acc {
                None => Some((n, n)),
                Some((lo, hi)) => Some((lo.min(n), hi.max(n))),
            })
    }
}

/// An ordered set of equal-length fields
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub name: Option<String>,
    pub fields: Vec<Field>,
    /// Whether a header row is drawn when this frame is shown as a sub-table
    pub show_header: bool,
}

impl DataFrame {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { name: None, fields, show_header: true }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn without_header(mut self) -> Self {
        self.show_header = false;
        self
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Row count taken from the first field; see `validate` for the length check
    pub fn row_count(&self) -> usize {
        self.fields.first().map(|f| f.len()).unwrap_or(0)
    }

    /// Check that every field has the same length, returning that length
    pub fn validate(&self) -> Result<usize, GridError> {
        let expected = self.row_count();
        for field in &self.fields {
            if field.len() != expected {
                return Err(GridError::LengthMismatch {
                    field: field.name.clone(),
                    expected,
                    actual: field.len(),
                });
            }
        }
        Ok(expected)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// First nested-table field, which drives row expansion
    pub fn nested_field_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.field_type == FieldType::NestedTable)
    }

    /// Sub-tables attached to a row (empty when the row has none)
    pub fn nested_frames(&self, row: usize) -> &[Arc<DataFrame>] {
        self.nested_field_index()
            .and_then(|i| self.fields.get(i))
            .map(|f| f.value(row).as_frames())
            .unwrap_or(&[])
    }

    /// First time field, used to match hover events to rows
    pub fn time_field_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.field_type == FieldType::Time)
    }
}
