//! Ordering translation.
//!
//! Callers describe result order as a pre-built [`SortDescriptor`], a
//! string such as `"lastName ASC, age DESC"`, a single `field -> direction`
//! pair, or a list of any of these. All shapes flatten into an ordered
//! list of descriptors; earlier descriptors take priority.
//!
//! Direction policy: an omitted direction sorts ascending; a present
//! direction sorts ascending only if it equals `ASC` (case-insensitive)
//! and descending otherwise, typos included.

use crate::core::schema::EntityDescription;
use crate::error::QueryError;
use crate::query::predicate::json_shape;
use std::collections::BTreeMap;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDescriptor {
    /// Field to sort by.
    pub field: String,
    /// Ascending when true.
    pub ascending: bool,
}

impl SortDescriptor {
    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    /// Parses one `field [direction]` segment.
    ///
    /// Returns `None` for a blank segment.
    #[must_use]
    pub fn parse(segment: &str) -> Option<Self> {
        let mut tokens = segment.split_whitespace();
        let field = tokens.next()?;
        let ascending = tokens.next().is_none_or(is_ascending);
        Some(Self {
            field: field.to_string(),
            ascending,
        })
    }
}

/// Returns true only for a case-insensitive `ASC`.
#[must_use]
pub fn is_ascending(direction: &str) -> bool {
    direction.trim().eq_ignore_ascii_case("ASC")
}

/// Loosely-typed ordering input accepted by finders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    /// Pre-built descriptor, used unchanged.
    Descriptor(SortDescriptor),
    /// Comma-separated `field [ASC|DESC]` segments.
    Text(String),
    /// Single `field -> direction` mapping.
    Pair {
        /// Field name.
        field: String,
        /// Direction token.
        direction: String,
    },
    /// Several orderings, concatenated in order.
    List(Vec<Self>),
}

impl Order {
    /// Flattens the ordering into descriptors.
    ///
    /// Blank input produces no descriptors.
    #[must_use]
    pub fn descriptors(&self) -> Vec<SortDescriptor> {
        match self {
            Self::Descriptor(descriptor) => vec![descriptor.clone()],
            Self::Text(text) => text.split(',').filter_map(SortDescriptor::parse).collect(),
            Self::Pair { field, direction } => {
                let field = field.trim();
                if field.is_empty() {
                    Vec::new()
                } else {
                    vec![SortDescriptor {
                        field: field.to_string(),
                        ascending: is_ascending(direction),
                    }]
                }
            }
            Self::List(items) => items.iter().flat_map(Self::descriptors).collect(),
        }
    }

    /// Flattens and checks every descriptor against `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a descriptor names a field
    /// the entity does not have.
    pub fn resolve(&self, entity: &EntityDescription) -> Result<Vec<SortDescriptor>, QueryError> {
        let descriptors = self.descriptors();
        if let Some(unknown) = descriptors.iter().find(|d| !entity.has_field(&d.field)) {
            return Err(QueryError::UnknownField {
                entity: entity.name.clone(),
                field: unknown.field.clone(),
            });
        }
        Ok(descriptors)
    }

    /// Builds a pair ordering from a single-entry mapping.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedOrder`] unless the map has exactly
    /// one entry.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, QueryError> {
        let mut entries = map.iter();
        match (entries.next(), entries.next()) {
            (Some((field, direction)), None) => Ok(Self::Pair {
                field: field.clone(),
                direction: direction.clone(),
            }),
            _ => Err(QueryError::UnsupportedOrder {
                shape: format!("mapping with {} entries", map.len()),
            }),
        }
    }
}

impl From<SortDescriptor> for Order {
    fn from(descriptor: SortDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<&str> for Order {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Order {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Order {
    fn from((field, direction): (K, V)) -> Self {
        Self::Pair {
            field: field.into(),
            direction: direction.into(),
        }
    }
}

impl From<Vec<Self>> for Order {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl TryFrom<serde_json::Value> for Order {
    type Error = QueryError;

    /// Strings become text orderings, single-entry objects become pairs,
    /// and arrays translate element-wise.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::String(text) => Ok(Self::Text(text)),
            serde_json::Value::Object(map) => {
                let map = map
                    .into_iter()
                    .map(|(field, direction)| match direction {
                        serde_json::Value::String(d) => Ok((field, d)),
                        other => Err(QueryError::UnsupportedOrder {
                            shape: format!("{} direction for '{field}'", json_shape(&other)),
                        }),
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Self::from_map(&map)
            }
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            other => Err(QueryError::UnsupportedOrder {
                shape: json_shape(&other).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::AttributeType;
    use test_case::test_case;

    #[test_case("name", true ; "omitted direction ascends")]
    #[test_case("name ASC", true ; "asc")]
    #[test_case("name asc", true ; "lowercase asc")]
    #[test_case("name DESC", false ; "desc")]
    #[test_case("name desc", false ; "lowercase desc")]
    #[test_case("name ASCENDING", false ; "typo descends")]
    #[test_case("  name   Asc  ", true ; "extra whitespace")]
    fn test_direction_parsing(segment: &str, ascending: bool) {
        let descriptor = SortDescriptor::parse(segment).unwrap();
        assert_eq!(descriptor.field, "name");
        assert_eq!(descriptor.ascending, ascending);
    }

    #[test]
    fn test_comma_separated_priority() {
        let order = Order::from("lastName ASC, firstName DESC,age");
        assert_eq!(
            order.descriptors(),
            vec![
                SortDescriptor::asc("lastName"),
                SortDescriptor::desc("firstName"),
                SortDescriptor::asc("age"),
            ]
        );
    }

    #[test]
    fn test_blank_input_yields_no_ordering() {
        assert!(Order::from("").descriptors().is_empty());
        assert!(Order::from(" , ,").descriptors().is_empty());
        assert!(Order::from(("", "DESC")).descriptors().is_empty());
        assert!(Order::List(Vec::new()).descriptors().is_empty());
    }

    #[test]
    fn test_pair_and_list() {
        let order = Order::from(vec![
            Order::from(("age", "desc")),
            SortDescriptor::asc("name").into(),
            Order::from("city"),
        ]);
        assert_eq!(
            order.descriptors(),
            vec![
                SortDescriptor::desc("age"),
                SortDescriptor::asc("name"),
                SortDescriptor::asc("city"),
            ]
        );
    }

    #[test]
    fn test_from_map_requires_single_entry() {
        let mut map = BTreeMap::new();
        assert!(Order::from_map(&map).is_err());

        map.insert("age".to_string(), "DESC".to_string());
        assert_eq!(
            Order::from_map(&map).unwrap().descriptors(),
            vec![SortDescriptor::desc("age")]
        );

        map.insert("name".to_string(), "ASC".to_string());
        assert!(matches!(
            Order::from_map(&map),
            Err(QueryError::UnsupportedOrder { .. })
        ));
    }

    #[test]
    fn test_from_json() {
        let order = Order::try_from(serde_json::json!(["age DESC", {"name": "asc"}])).unwrap();
        assert_eq!(
            order.descriptors(),
            vec![SortDescriptor::desc("age"), SortDescriptor::asc("name")]
        );

        assert!(Order::try_from(serde_json::json!(3)).is_err());
        assert!(Order::try_from(serde_json::json!({"age": 1})).is_err());
    }

    #[test]
    fn test_resolve_checks_fields() {
        let entity = EntityDescription::new("Person").attribute("age", AttributeType::Integer);
        assert!(Order::from("age DESC, id").resolve(&entity).is_ok());
        assert!(matches!(
            Order::from("height").resolve(&entity),
            Err(QueryError::UnknownField { .. })
        ));
    }
}
