//! Persistence stack management.
//!
//! The [`PersistenceCoordinator`] owns the schema model, the active
//! [`StoreCoordinator`] and the default [`WorkingContext`]. It replaces the
//! process-wide manager of classic active-record layers with an explicit
//! value that callers pass to the finder operations.

pub mod config;
pub mod context;
pub mod coordinator;

pub use config::{SchemaSource, StoreConfig};
pub use context::{RecordRef, WorkingContext};
pub use coordinator::{PersistenceCoordinator, StoreCoordinator};
