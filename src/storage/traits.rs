//! Storage trait definition.
//!
//! Defines the interface a persistence backend offers the working context:
//! fetch and count a [`FetchSpec`] with pending changes visible, and commit
//! a change set atomically.

use crate::core::value::Value;
use crate::error::Result;
use crate::query::FetchSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Kind of physical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// File-backed `SQLite` database.
    OnDisk,
    /// Transient in-memory database.
    InMemory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnDisk => write!(f, "on-disk"),
            Self::InMemory => write!(f, "in-memory"),
        }
    }
}

/// A record created in a context and not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsert {
    /// Entity name.
    pub entity: String,
    /// Values set so far.
    pub values: BTreeMap<String, Value>,
}

/// Uncommitted edits to a committed record.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    /// Entity name.
    pub entity: String,
    /// Object id of the record.
    pub id: i64,
    /// Changed fields only.
    pub values: BTreeMap<String, Value>,
}

/// A committed record marked for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    /// Entity name.
    pub entity: String,
    /// Object id of the record.
    pub id: i64,
}

/// The pending mutations of one working context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Records to insert, in creation order.
    pub inserts: Vec<PendingInsert>,
    /// Records to update.
    pub updates: Vec<PendingUpdate>,
    /// Records to delete.
    pub deletes: Vec<PendingDelete>,
}

impl ChangeSet {
    /// Returns true when there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Identity of a fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowId {
    /// A committed row with this object id.
    Stored(i64),
    /// The pending insert at this index of the change set.
    Pending(usize),
}

/// A fetched row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row identity.
    pub id: RowId,
    /// Column values, by field name. Null columns are omitted.
    pub values: BTreeMap<String, Value>,
}

/// Trait for persistence backends.
///
/// Implementations are used from a single thread; every method takes
/// `&self` so one store can be shared by several contexts.
pub trait Store {
    /// The kind of store.
    fn kind(&self) -> StoreKind;

    /// Backing file, if any.
    fn location(&self) -> Option<&Path>;

    /// Executes `spec` and returns matching rows.
    ///
    /// `pending` is visible to the query: inserts can match, deletes are
    /// excluded, and updates are matched on their new values. Nothing from
    /// `pending` is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be executed.
    fn fetch(&self, spec: &FetchSpec, pending: &ChangeSet) -> Result<Vec<Row>>;

    /// Counts rows matching `spec` without materializing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be executed.
    fn count(&self, spec: &FetchSpec, pending: &ChangeSet) -> Result<usize>;

    /// Writes `changes` atomically.
    ///
    /// Returns the object ids assigned to `changes.inserts`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is persisted then.
    fn commit(&self, changes: &ChangeSet) -> Result<Vec<i64>>;

    /// Gathers store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StoreStats>;
}

/// Store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Kind of store.
    pub kind: StoreKind,
    /// Backing file, if any.
    pub path: Option<String>,
    /// Committed record count per entity, in schema order.
    pub entity_counts: Vec<(String, usize)>,
    /// Store layout version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
