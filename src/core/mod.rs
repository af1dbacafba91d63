//! Core domain models for recordkit.
//!
//! This module contains the schema model, field values, and records. These
//! are pure domain models with no I/O beyond loading a schema definition.

pub mod naming;
pub mod record;
pub mod schema;
pub mod value;

pub use record::{Record, RecordState};
pub use schema::{
    AttributeType, EntityDescription, FieldDescription, FieldKind, PRIMARY_KEY, SchemaModel,
};
pub use value::{Attributes, Value};
