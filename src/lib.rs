//! # recordkit
//!
//! Active-record finders and a persistence-stack manager over `SQLite`.
//!
//! Domain types implement [`ActiveRecord`] to get class-level create,
//! find, count and delete operations. Those operations run against a
//! [`WorkingContext`] owned by a [`PersistenceCoordinator`], which also
//! manages the store itself: opening it, switching to an in-memory store,
//! and deleting it to start over.
//!
//! ## Features
//!
//! - **Loose queries**: conditions as predicates, equality maps, or raw
//!   SQL; orderings as strings, pairs, descriptors, or lists of those
//! - **Pending changes visible**: fetches and counts see unsaved inserts,
//!   edits and deletes of the context
//! - **Stale-handle detection**: handles obtained before a reset fail
//!   loudly instead of touching the new store
//! - **Atomic saves**: a failed save keeps every pending change for retry
//!
//! ## Example
//!
//! ```
//! use recordkit::{
//!     ActiveRecord, AttributeType, EntityDescription, PersistenceCoordinator, Query,
//!     SchemaModel, StoreConfig,
//! };
//!
//! struct Person;
//! impl ActiveRecord for Person {}
//!
//! let dir = tempfile::tempdir().unwrap();
//! let schema = SchemaModel::new(vec![
//!     EntityDescription::new("Person")
//!         .attribute("firstName", AttributeType::String)
//!         .attribute("age", AttributeType::Integer),
//! ])
//! .unwrap();
//! let mut stack =
//!     PersistenceCoordinator::open(StoreConfig::new("Example", schema).with_directory(dir.path()))
//!         .unwrap();
//!
//! for (name, age) in [("Ann", 31), ("Bob", 25)] {
//!     let person = Person::create(&mut stack).unwrap();
//!     stack.context_mut().set_value(person, "first_name", name).unwrap();
//!     stack.context_mut().set_value(person, "age", age).unwrap();
//! }
//! assert!(stack.save_context());
//!
//! let young = Person::where_with(&mut stack, Query::matching("age < 30").order("firstName")).unwrap();
//! assert_eq!(young.len(), 1);
//! assert_eq!(Person::count(&stack).unwrap(), 2);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod core;
pub mod error;
pub mod facade;
pub mod persistence;
pub mod query;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    AttributeType, Attributes, EntityDescription, FieldDescription, FieldKind, Record,
    RecordState, SchemaModel, Value,
};

// Re-export query types
pub use query::{Comparison, Condition, FetchSpec, Order, Predicate, Query, SortDescriptor};

// Re-export persistence types
pub use persistence::{
    PersistenceCoordinator, RecordRef, SchemaSource, StoreConfig, StoreCoordinator,
    WorkingContext,
};

// Re-export facade types
pub use facade::{ActiveRecord, Finder};

// Re-export storage types
pub use storage::{SqliteStore, Store, StoreKind};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
