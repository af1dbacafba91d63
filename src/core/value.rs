//! Field values.
//!
//! A [`Value`] is one scalar stored in a record field. Values convert to and
//! from `SQLite` parameters and JSON, and coerce into a field's declared type
//! when attributes are applied to a record.

use crate::core::schema::{AttributeType, FieldDescription, FieldKind};
use crate::error::QueryError;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping from field name to value, as supplied to `create`/`update`.
pub type Attributes = BTreeMap<String, Value>;

/// A scalar field value.
///
/// # Examples
///
/// ```
/// use recordkit::Value;
///
/// let v: Value = "John".into();
/// assert_eq!(v, Value::Text("John".to_string()));
/// assert!(Value::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value (stored as integer 0/1).
    Boolean(bool),
    /// Integer value (i64).
    Integer(i64),
    /// Floating point value (f64).
    Real(f64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Short name of the value's type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    /// Converts a JSON scalar into a value.
    ///
    /// Returns `None` for arrays and objects, which have no scalar form.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Real)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Decodes a column value read from `SQLite`.
    ///
    /// Booleans are stored as integers, so the field type decides how an
    /// integer column is surfaced.
    #[must_use]
    pub fn from_column(column: ValueRef<'_>, kind: &FieldKind) -> Self {
        match column {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => match kind {
                FieldKind::Attribute {
                    attribute_type: AttributeType::Boolean,
                    ..
                } => Self::Boolean(i != 0),
                FieldKind::Attribute {
                    attribute_type: AttributeType::Double,
                    ..
                } => {
                    #[allow(clippy::cast_precision_loss)]
                    let real = i as f64;
                    Self::Real(real)
                }
                _ => Self::Integer(i),
            },
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    /// Coerces this value into the type declared by `field`.
    ///
    /// Null is accepted for every field; whether the field may stay null is
    /// enforced by the store at commit time.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TypeMismatch`] if the value has no sensible
    /// representation in the field's type.
    pub fn coerce_to(self, field: &FieldDescription) -> Result<Self, QueryError> {
        if self.is_null() {
            return Ok(self);
        }

        let coerced = match &field.kind {
            FieldKind::Relationship { .. } => match &self {
                Self::Integer(_) => Some(self.clone()),
                Self::Text(s) => s.trim().parse().ok().map(Self::Integer),
                _ => None,
            },
            FieldKind::Attribute { attribute_type, .. } => match attribute_type {
                AttributeType::String => Some(Self::Text(self.to_string())),
                AttributeType::Integer => match &self {
                    Self::Integer(_) => Some(self.clone()),
                    Self::Boolean(b) => Some(Self::Integer(i64::from(*b))),
                    #[allow(clippy::cast_possible_truncation)]
                    Self::Real(f) if f.fract() == 0.0 => Some(Self::Integer(*f as i64)),
                    Self::Text(s) => s.trim().parse().ok().map(Self::Integer),
                    _ => None,
                },
                AttributeType::Double => match &self {
                    Self::Real(_) => Some(self.clone()),
                    #[allow(clippy::cast_precision_loss)]
                    Self::Integer(i) => Some(Self::Real(*i as f64)),
                    Self::Text(s) => s.trim().parse().ok().map(Self::Real),
                    _ => None,
                },
                AttributeType::Boolean => match &self {
                    Self::Boolean(_) => Some(self.clone()),
                    Self::Integer(0) => Some(Self::Boolean(false)),
                    Self::Integer(1) => Some(Self::Boolean(true)),
                    Self::Text(s) => parse_bool(s).map(Self::Boolean),
                    _ => None,
                },
            },
        };

        coerced.ok_or_else(|| QueryError::TypeMismatch {
            field: field.name.clone(),
            expected: field.kind.type_label().to_string(),
            found: format!("{} {self}", self.type_name()),
        })
    }

    /// Converts the value into JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Real(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            Self::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Self::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
