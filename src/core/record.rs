//! Records and their lifecycle.
//!
//! A [`Record`] is one instance of an entity registered in a working
//! context. Records move through
//! `Unsaved -> Saved -> PendingDelete -> Purged`; a purged record rejects
//! every further mutation.

use crate::core::value::Value;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Created in a context, never committed.
    Unsaved,
    /// Committed; may carry uncommitted edits.
    Saved,
    /// Marked for deletion, pending commit.
    PendingDelete,
    /// Deleted and committed. Terminal.
    Purged,
}

/// One instance of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    entity: String,
    object_id: Option<i64>,
    values: BTreeMap<String, Value>,
    #[serde(skip)]
    changed: BTreeSet<String>,
    state: RecordState,
}

impl Record {
    /// Creates a new unsaved record with no values.
    pub(crate) fn unsaved(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            object_id: None,
            values: BTreeMap::new(),
            changed: BTreeSet::new(),
            state: RecordState::Unsaved,
        }
    }

    /// Materializes a committed record read from the store.
    pub(crate) fn saved(
        entity: impl Into<String>,
        object_id: i64,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            entity: entity.into(),
            object_id: Some(object_id),
            values,
            changed: BTreeSet::new(),
            state: RecordState::Saved,
        }
    }

    /// Entity name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Object id assigned by the store; `None` until first commit.
    #[must_use]
    pub const fn object_id(&self) -> Option<i64> {
        self.object_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RecordState {
        self.state
    }

    /// Value of a field; `None` when the field was never set.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// All set values, by field name.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// True if committing the owning context would write this record.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match self.state {
            RecordState::Unsaved => true,
            RecordState::PendingDelete => self.object_id.is_some(),
            RecordState::Saved => !self.changed.is_empty(),
            RecordState::Purged => false,
        }
    }

    /// True once the record is marked for deletion or purged.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(
            self.state,
            RecordState::PendingDelete | RecordState::Purged
        )
    }

    /// True for a record deleted before it was ever committed.
    pub(crate) const fn is_discarded(&self) -> bool {
        matches!(self.state, RecordState::PendingDelete) && self.object_id.is_none()
    }

    /// Fields edited since the last commit.
    pub(crate) fn changed_values(&self) -> BTreeMap<String, Value> {
        self.changed
            .iter()
            .filter_map(|field| {
                self.values
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect()
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.state == RecordState::Purged {
            return Err(Error::invalid_state(format!(
                "{} record {} has been purged",
                self.entity,
                self.object_id.map_or_else(|| "(unsaved)".to_string(), |id| id.to_string())
            )));
        }
        Ok(())
    }

    /// Sets a field value and records the edit.
    pub(crate) fn set(&mut self, field: impl Into<String>, value: Value) -> Result<()> {
        self.ensure_mutable()?;
        let field = field.into();
        self.values.insert(field.clone(), value);
        self.changed.insert(field);
        Ok(())
    }

    /// Marks the record for deletion.
    pub(crate) fn mark_deleted(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.state = RecordState::PendingDelete;
        Ok(())
    }

    /// Applies a successful commit to this record.
    pub(crate) fn did_commit(&mut self, assigned_id: Option<i64>) {
        match self.state {
            RecordState::Unsaved => {
                self.object_id = assigned_id;
                self.state = RecordState::Saved;
            }
            RecordState::PendingDelete => self.state = RecordState::Purged,
            RecordState::Saved | RecordState::Purged => {}
        }
        self.changed.clear();
    }
}
