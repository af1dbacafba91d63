//! Filter expressions and condition translation.
//!
//! A [`Predicate`] is a structured boolean expression over an entity's
//! fields. A [`Condition`] is the loosely-typed form callers pass to
//! finders: a pre-built predicate, an equality mapping, or a raw
//! backend-native expression string.

use crate::core::schema::EntityDescription;
use crate::core::value::Value;
use crate::error::QueryError;
use std::collections::{BTreeMap, HashMap};

/// Comparison operator of a [`Predicate::Compare`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// SQL `LIKE` pattern match.
    Like,
}

/// A boolean expression over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    True,
    /// `field <op> value`.
    Compare {
        /// Field name.
        field: String,
        /// Operator.
        op: Comparison,
        /// Right-hand value.
        value: Value,
    },
    /// Conjunction; empty matches everything.
    And(Vec<Self>),
    /// Disjunction; empty matches nothing.
    Or(Vec<Self>),
    /// Negation.
    Not(Box<Self>),
    /// Backend-native expression, passed through unvalidated.
    Raw(String),
}

impl Predicate {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Equal, value)
    }

    /// `field != value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::NotEqual, value)
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Less, value)
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Greater, value)
    }

    /// `field LIKE pattern`.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, Comparison::Like, Value::Text(pattern.into()))
    }

    /// Generic comparison node.
    pub fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction of `self` and `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negation of `self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Checks that every structured field reference exists on `entity`.
    ///
    /// Raw expressions are not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] for the first unknown field.
    pub fn validate(&self, entity: &EntityDescription) -> Result<(), QueryError> {
        match self {
            Self::True | Self::Raw(_) => Ok(()),
            Self::Compare { field, .. } => {
                if entity.has_field(field) {
                    Ok(())
                } else {
                    Err(QueryError::UnknownField {
                        entity: entity.name.clone(),
                        field: field.clone(),
                    })
                }
            }
            Self::And(parts) | Self::Or(parts) => {
                parts.iter().try_for_each(|p| p.validate(entity))
            }
            Self::Not(inner) => inner.validate(entity),
        }
    }
}

/// Loosely-typed filter input accepted by finders.
///
/// # Examples
///
/// ```
/// use recordkit::{Condition, Predicate};
///
/// let raw: Condition = "name == 'John'".into();
/// let by_map = Condition::equals([("name", "John")]);
/// let built: Condition = Predicate::eq("name", "John").into();
/// # let _ = (raw, by_map, built);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Pre-built expression, used unchanged.
    Predicate(Predicate),
    /// One equality per entry, combined with AND. Empty matches everything.
    Equals(BTreeMap<String, Value>),
    /// Backend-native expression string.
    Raw(String),
}

impl Condition {
    /// Equality mapping from `(field, value)` pairs.
    pub fn equals<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Equals(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Translates the condition into a predicate for `entity`.
    ///
    /// Equality keys are resolved with the same snake/camel translation
    /// used for attributes, and their values coerced to the field's type.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a structured field reference
    /// does not exist on the entity, or [`QueryError::TypeMismatch`] if an
    /// equality value cannot be coerced.
    pub fn into_predicate(self, entity: &EntityDescription) -> Result<Predicate, QueryError> {
        let predicate = match self {
            Self::Predicate(predicate) => predicate,
            Self::Raw(expression) => Predicate::Raw(expression),
            Self::Equals(map) if map.is_empty() => Predicate::True,
            Self::Equals(map) => Predicate::And(
                map.into_iter()
                    .map(|(key, value)| -> Result<Predicate, QueryError> {
                        if key == crate::core::PRIMARY_KEY {
                            return Ok(Predicate::eq(key, value));
                        }
                        match entity.resolve_field(&key) {
                            Some(field) => Ok(Predicate::eq(
                                field.name.clone(),
                                value.coerce_to(field)?,
                            )),
                            None => Ok(Predicate::eq(key, value)),
                        }
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };
        predicate.validate(entity)?;
        Ok(predicate)
    }
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

impl From<&str> for Condition {
    fn from(expression: &str) -> Self {
        Self::Raw(expression.to_string())
    }
}

impl From<String> for Condition {
    fn from(expression: String) -> Self {
        Self::Raw(expression)
    }
}

impl From<BTreeMap<String, Value>> for Condition {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Equals(map)
    }
}

impl From<HashMap<String, Value>> for Condition {
    fn from(map: HashMap<String, Value>) -> Self {
        Self::Equals(map.into_iter().collect())
    }
}

impl TryFrom<serde_json::Value> for Condition {
    type Error = QueryError;

    /// Objects become equality mappings and strings become raw
    /// expressions. Every other shape is rejected.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::String(expression) => Ok(Self::Raw(expression)),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| {
                    Value::from_json(&value).map(|v| (key.clone(), v)).ok_or_else(|| {
                        QueryError::UnsupportedCondition {
                            shape: format!("non-scalar value for key '{key}'"),
                        }
                    })
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Equals),
            other => Err(QueryError::UnsupportedCondition {
                shape: json_shape(&other).to_string(),
            }),
        }
    }
}

pub(crate) const fn json_shape(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
