//! Schema model.
//!
//! The schema model describes every entity the store knows about and the
//! fields each entity carries. It is loaded once (from a packaged JSON
//! definition or built in code), validated, and shared immutably.

use crate::core::naming::{lower_camel_case, upper_camel_case};
use crate::error::{QueryError, Result, SchemaError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Name of the implicit primary key column on every entity table.
pub const PRIMARY_KEY: &str = "id";

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Double,
    /// Boolean, stored as 0/1.
    Boolean,
}

impl AttributeType {
    /// `SQLite` column affinity for this type.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::String => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Double => "REAL",
        }
    }

    /// Lowercase label, matching the JSON definition format.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
        }
    }
}

const fn default_optional() -> bool {
    true
}

/// Whether a field is a plain attribute or a to-one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    /// Scalar attribute.
    Attribute {
        /// Declared value type.
        #[serde(rename = "type")]
        attribute_type: AttributeType,
        /// Whether the attribute may be null when committed.
        #[serde(default = "default_optional")]
        optional: bool,
    },
    /// To-one relationship, stored as the destination record's object id.
    Relationship {
        /// Destination entity name.
        destination: String,
    },
}

impl FieldKind {
    /// Label used in error messages.
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Attribute { attribute_type, .. } => attribute_type.label(),
            Self::Relationship { .. } => "relationship",
        }
    }
}

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Field name (also the column name).
    pub name: String,
    /// Field kind.
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescription {
    /// Creates an optional attribute.
    #[must_use]
    pub fn attribute(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Attribute {
                attribute_type,
                optional: true,
            },
        }
    }

    /// Creates a required (non-null) attribute.
    #[must_use]
    pub fn required(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Attribute {
                attribute_type,
                optional: false,
            },
        }
    }

    /// Creates a to-one relationship.
    #[must_use]
    pub fn relationship(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Relationship {
                destination: destination.into(),
            },
        }
    }

    /// Returns true for relationships.
    #[must_use]
    pub const fn is_relationship(&self) -> bool {
        matches!(self.kind, FieldKind::Relationship { .. })
    }
}

/// An entity: a named record type with an ordered field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    /// Entity name (also the table name).
    pub name: String,
    /// Ordered fields, excluding the implicit primary key.
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
}

impl EntityDescription {
    /// Creates an entity with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescription) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an optional attribute.
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.with_field(FieldDescription::attribute(name, attribute_type))
    }

    /// Adds a required attribute.
    #[must_use]
    pub fn required(self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.with_field(FieldDescription::required(name, attribute_type))
    }

    /// Adds a to-one relationship.
    #[must_use]
    pub fn relationship(self, name: impl Into<String>, destination: impl Into<String>) -> Self {
        self.with_field(FieldDescription::relationship(name, destination))
    }

    /// Looks up a field by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if `name` can be referenced in filters and orderings.
    ///
    /// The primary key counts as a field here.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        name == PRIMARY_KEY || self.field(name).is_some()
    }

    /// Resolves an external key to a field.
    ///
    /// Tries the key as given, then its lowerCamelCase and UpperCamelCase
    /// forms, so `first_name` finds `firstName`.
    #[must_use]
    pub fn resolve_field(&self, key: &str) -> Option<&FieldDescription> {
        self.field(key)
            .or_else(|| self.field(&lower_camel_case(key)))
            .or_else(|| self.field(&upper_camel_case(key)))
    }

    /// Like [`Self::field`] but returns a typed error when missing.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if the field does not exist.
    pub fn require_field(&self, name: &str) -> std::result::Result<&FieldDescription, QueryError> {
        self.field(name).ok_or_else(|| QueryError::UnknownField {
            entity: self.name.clone(),
            field: name.to_string(),
        })
    }
}

/// Immutable schema model shared by every store and context.
///
/// # Examples
///
/// ```
/// use recordkit::{AttributeType, EntityDescription, SchemaModel};
///
/// let schema = SchemaModel::new(vec![
///     EntityDescription::new("Person")
///         .attribute("firstName", AttributeType::String)
///         .attribute("age", AttributeType::Integer),
/// ])
/// .unwrap();
/// assert!(schema.entity("Person").is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    entities: Vec<EntityDescription>,
}

impl SchemaModel {
    /// Builds and validates a schema model.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid identifiers, duplicate names,
    /// use of the reserved `id` field, or dangling relationships.
    pub fn new(entities: Vec<EntityDescription>) -> Result<Self> {
        let schema = Self { entities };
        schema.validate()?;
        Ok(schema)
    }

    /// Parses a JSON schema definition.
    ///
    /// The format is `{"entities": [{"name": ..., "fields": [...]}]}` where
    /// each field is `{"name", "kind": "attribute", "type", "optional"}` or
    /// `{"name", "kind": "relationship", "destination"}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the model is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(json).map_err(SchemaError::from)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Loads a JSON schema definition from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Serializes the model back to its JSON definition.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// All entities, in definition order.
    #[must_use]
    pub fn entities(&self) -> &[EntityDescription] {
        &self.entities
    }

    /// Looks up an entity by name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownEntity`] if no entity has that name.
    pub fn entity(&self, name: &str) -> std::result::Result<&EntityDescription, QueryError> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| QueryError::UnknownEntity {
                name: name.to_string(),
            })
    }

    fn validate(&self) -> Result<()> {
        let identifier = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| SchemaError::Parse(format!("identifier pattern: {e}")))?;
        let check = |name: &str| -> Result<()> {
            if identifier.is_match(name) {
                Ok(())
            } else {
                Err(SchemaError::InvalidIdentifier {
                    name: name.to_string(),
                }
                .into())
            }
        };

        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            check(&entity.name)?;
            if !entity_names.insert(entity.name.as_str()) {
                return Err(SchemaError::DuplicateEntity {
                    name: entity.name.clone(),
                }
                .into());
            }
        }

        for entity in &self.entities {
            let mut field_names = HashSet::new();
            for field in &entity.fields {
                check(&field.name)?;
                if field.name.eq_ignore_ascii_case(PRIMARY_KEY) {
                    return Err(SchemaError::ReservedField {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                    }
                    .into());
                }
                if !field_names.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                    }
                    .into());
                }
                if let FieldKind::Relationship { destination } = &field.kind
                    && !entity_names.contains(destination.as_str())
                {
                    return Err(SchemaError::UnknownDestination {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        destination: destination.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}
