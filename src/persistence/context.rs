//! Working contexts and record handles.
//!
//! A [`WorkingContext`] is the unit of work: it owns every record created
//! or fetched through it and commits their pending changes together.
//! Records are addressed by [`RecordRef`] handles, which stay valid until
//! the store the context is bound to is replaced.

use crate::core::record::{Record, RecordState};
use crate::core::schema::SchemaModel;
use crate::core::value::{Attributes, Value};
use crate::error::{Error, QueryError, Result, StorageError};
use crate::persistence::coordinator::StoreCoordinator;
use crate::query::FetchSpec;
use crate::storage::{ChangeSet, PendingDelete, PendingInsert, PendingUpdate, RowId};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a record registered in a [`WorkingContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef {
    context: u64,
    slot: usize,
}

impl RecordRef {
    /// Id of the context that owns the record.
    #[must_use]
    pub const fn context_id(self) -> u64 {
        self.context
    }

    /// Resolves the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if `ctx` does not own the record or
    /// its store has been replaced.
    pub fn get(self, ctx: &WorkingContext) -> Result<&Record> {
        ctx.record(self)
    }

    /// Applies `attributes` to the record without committing.
    ///
    /// # Errors
    ///
    /// See [`WorkingContext::apply`].
    pub fn update(self, ctx: &mut WorkingContext, attributes: &Attributes) -> Result<()> {
        ctx.apply(self, attributes)
    }

    /// Marks the record for deletion.
    ///
    /// # Errors
    ///
    /// See [`WorkingContext::delete`].
    pub fn delete(self, ctx: &mut WorkingContext) -> Result<()> {
        ctx.delete(self)
    }

    /// Commits the owning context through this handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if `ctx` does not own the record or
    /// its store has been replaced, otherwise see [`WorkingContext::try_save`].
    pub fn try_save(self, ctx: &mut WorkingContext) -> Result<()> {
        ctx.slot(self)?;
        ctx.try_save()
    }

    /// Commits the owning context. Returns false if the handle is stale or
    /// the commit fails; the failure is logged.
    pub fn save(self, ctx: &mut WorkingContext) -> bool {
        match self.try_save(ctx) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    handle_context = self.context,
                    context = ctx.id,
                    error = %e,
                    "failed to save record"
                );
                false
            }
        }
    }
}

/// A unit of work bound to one store coordinator.
pub struct WorkingContext {
    id: u64,
    coordinator: Rc<StoreCoordinator>,
    records: Vec<Record>,
    identity: HashMap<(String, i64), usize>,
}

impl WorkingContext {
    pub(crate) fn new(coordinator: Rc<StoreCoordinator>) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            coordinator,
            records: Vec::new(),
            identity: HashMap::new(),
        }
    }

    /// Unique id of this context.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Schema model of the bound store.
    #[must_use]
    pub fn schema(&self) -> &SchemaModel {
        self.coordinator.schema()
    }

    /// Id of the bound store coordinator.
    #[must_use]
    pub fn coordinator_id(&self) -> u64 {
        self.coordinator.id()
    }

    /// True while the bound store coordinator is active.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.coordinator.is_valid()
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.coordinator.is_valid() {
            Ok(())
        } else {
            Err(Error::stale(format!(
                "context {} is bound to store coordinator {}, which has been replaced",
                self.id,
                self.coordinator.id()
            )))
        }
    }

    fn slot(&self, handle: RecordRef) -> Result<usize> {
        self.ensure_valid()?;
        if handle.context != self.id || handle.slot >= self.records.len() {
            return Err(Error::stale(format!(
                "record handle from context {} used with context {}",
                handle.context, self.id
            )));
        }
        Ok(handle.slot)
    }

    const fn handle(&self, slot: usize) -> RecordRef {
        RecordRef {
            context: self.id,
            slot,
        }
    }

    /// Registers a new unsaved record of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownEntity`] if the schema has no such
    /// entity, or [`Error::StaleHandle`] if the context is stale.
    pub fn insert(&mut self, entity: &str) -> Result<RecordRef> {
        self.ensure_valid()?;
        let name = self.schema().entity(entity)?.name.clone();
        self.records.push(Record::unsaved(name));
        Ok(self.handle(self.records.len() - 1))
    }

    /// Resolves a handle to its record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the handle belongs to another
    /// context or the store has been replaced.
    pub fn record(&self, handle: RecordRef) -> Result<&Record> {
        let slot = self.slot(handle)?;
        Ok(&self.records[slot])
    }

    /// Sets one field, coercing `value` to the field's type.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] or [`QueryError::TypeMismatch`]
    /// for bad input, and [`Error::InvalidState`] if the record is purged.
    pub fn set_value(
        &mut self,
        handle: RecordRef,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let attributes = Attributes::from([(field.to_string(), value.into())]);
        self.apply(handle, &attributes)
    }

    /// Applies `attributes` to a record.
    ///
    /// Keys are matched exactly, then in lowerCamelCase and UpperCamelCase
    /// form. Every key is translated before any value is written, so a bad
    /// key leaves the record untouched.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] for keys that match no field,
    /// [`QueryError::TypeMismatch`] for values that cannot be coerced, and
    /// [`Error::InvalidState`] if the record is purged.
    pub fn apply(&mut self, handle: RecordRef, attributes: &Attributes) -> Result<()> {
        let slot = self.slot(handle)?;
        let entity = self.schema().entity(self.records[slot].entity())?;

        let mut translated = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            let field = entity
                .resolve_field(key)
                .ok_or_else(|| QueryError::UnknownField {
                    entity: entity.name.clone(),
                    field: key.clone(),
                })?;
            translated.push((field.name.clone(), value.clone().coerce_to(field)?));
        }

        let record = &mut self.records[slot];
        for (field, value) in translated {
            record.set(field, value)?;
        }
        Ok(())
    }

    /// Marks a record for deletion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the record is already purged.
    pub fn delete(&mut self, handle: RecordRef) -> Result<()> {
        let slot = self.slot(handle)?;
        self.records[slot].mark_deleted()
    }

    /// True if saving would write anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.records.iter().any(Record::has_changes)
    }

    /// Live (not purged) records registered in this context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the store has been replaced.
    pub fn records(&self) -> Result<impl Iterator<Item = (RecordRef, &Record)>> {
        self.ensure_valid()?;
        Ok(self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.state() != RecordState::Purged)
            .map(|(slot, record)| (self.handle(slot), record)))
    }

    /// Pending changes, plus the slot of each pending insert.
    pub(crate) fn change_set(&self) -> (ChangeSet, Vec<usize>) {
        let mut changes = ChangeSet::default();
        let mut insert_slots = Vec::new();

        for (slot, record) in self.records.iter().enumerate() {
            match (record.state(), record.object_id()) {
                (RecordState::Unsaved, _) => {
                    changes.inserts.push(PendingInsert {
                        entity: record.entity().to_string(),
                        values: record.values().clone(),
                    });
                    insert_slots.push(slot);
                }
                (RecordState::Saved, Some(id)) if record.has_changes() => {
                    changes.updates.push(PendingUpdate {
                        entity: record.entity().to_string(),
                        id,
                        values: record.changed_values(),
                    });
                }
                (RecordState::PendingDelete, Some(id)) => {
                    changes.deletes.push(PendingDelete {
                        entity: record.entity().to_string(),
                        id,
                    });
                }
                _ => {}
            }
        }

        (changes, insert_slots)
    }

    /// Executes `spec` and returns handles to the matching records.
    ///
    /// Pending changes are visible. Rows already registered in this
    /// context resolve to their existing handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is stale or the store fails.
    pub fn fetch(&mut self, spec: &FetchSpec) -> Result<Vec<RecordRef>> {
        self.ensure_valid()?;
        let (pending, insert_slots) = self.change_set();
        let rows = self
            .coordinator
            .with_store(|store| store.fetch(spec, &pending))?;

        let mut handles = Vec::with_capacity(rows.len());
        for row in rows {
            let slot = match row.id {
                RowId::Pending(index) => insert_slots.get(index).copied().ok_or_else(|| {
                    StorageError::Fetch(format!("unknown pending insert {index}"))
                })?,
                RowId::Stored(id) => self.register(spec.entity(), id, row.values),
            };
            handles.push(self.handle(slot));
        }
        Ok(handles)
    }

    fn register(&mut self, entity: &str, id: i64, values: Attributes) -> usize {
        let key = (entity.to_string(), id);
        if let Some(slot) = self.identity.get(&key) {
            return *slot;
        }
        self.records.push(Record::saved(entity, id, values));
        let slot = self.records.len() - 1;
        self.identity.insert(key, slot);
        slot
    }

    /// Counts records matching `spec` without materializing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is stale or the store fails.
    pub fn count(&self, spec: &FetchSpec) -> Result<usize> {
        self.ensure_valid()?;
        let (pending, _) = self.change_set();
        self.coordinator
            .with_store(|store| store.count(spec, &pending))
    }

    /// Commits pending changes atomically.
    ///
    /// On failure every record keeps its state and edits, so the save can
    /// be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is stale or the commit fails.
    pub fn try_save(&mut self) -> Result<()> {
        self.ensure_valid()?;
        if !self.has_changes() {
            self.purge_discarded();
            return Ok(());
        }

        let (changes, insert_slots) = self.change_set();
        let assigned = self.coordinator.with_store(|store| store.commit(&changes))?;

        for (slot, id) in insert_slots.into_iter().zip(assigned) {
            let record = &mut self.records[slot];
            record.did_commit(Some(id));
            if record.state() == RecordState::Saved {
                self.identity.insert((record.entity().to_string(), id), slot);
            }
        }
        for record in self.records.iter_mut().filter(|r| r.has_changes()) {
            if let (RecordState::PendingDelete, Some(id)) =
                (record.state(), record.object_id())
            {
                self.identity.remove(&(record.entity().to_string(), id));
            }
            record.did_commit(None);
        }
        self.purge_discarded();
        Ok(())
    }

    fn purge_discarded(&mut self) {
        for record in self.records.iter_mut().filter(|r| r.is_discarded()) {
            record.did_commit(None);
        }
    }

    /// Commits pending changes, logging any failure.
    ///
    /// Returns true when there was nothing to save or the commit
    /// succeeded.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(context = self.id, error = %e, "failed to save context");
                false
            }
        }
    }
}

impl std::fmt::Debug for WorkingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingContext")
            .field("id", &self.id)
            .field("coordinator", &self.coordinator.id())
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{AttributeType, EntityDescription};
    use crate::query::{Predicate, Query};
    use crate::storage::StoreKind;
    use std::sync::Arc;

    fn coordinator() -> Rc<StoreCoordinator> {
        let schema = SchemaModel::new(vec![
            EntityDescription::new("Person")
                .attribute("firstName", AttributeType::String)
                .attribute("age", AttributeType::Integer),
            EntityDescription::new("Badge").required("label", AttributeType::String),
        ])
        .unwrap();
        Rc::new(StoreCoordinator::open(StoreKind::InMemory, Arc::new(schema), None, true).unwrap())
    }

    fn person_spec(ctx: &WorkingContext, query: Query) -> FetchSpec {
        FetchSpec::build(ctx.schema().entity("Person").unwrap(), query).unwrap()
    }

    #[test]
    fn test_insert_and_save_assigns_id() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        ctx.set_value(person, "firstName", "Ann").unwrap();
        assert!(ctx.has_changes());

        assert!(ctx.save());
        assert!(!ctx.has_changes());
        let record = person.get(&ctx).unwrap();
        assert_eq!(record.state(), RecordState::Saved);
        assert!(record.object_id().is_some());
    }

    #[test]
    fn test_apply_translates_snake_case_and_coerces() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        let attributes = Attributes::from([
            ("first_name".to_string(), Value::from("Ann")),
            ("age".to_string(), Value::from("42")),
        ]);
        person.update(&mut ctx, &attributes).unwrap();

        let record = person.get(&ctx).unwrap();
        assert_eq!(record.get("firstName"), Some(&Value::from("Ann")));
        assert_eq!(record.get("age"), Some(&Value::Integer(42)));
    }

    #[test]
    fn test_apply_rejects_unknown_key_without_partial_write() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        let attributes = Attributes::from([
            ("age".to_string(), Value::Integer(3)),
            ("nickname".to_string(), Value::from("A")),
        ]);
        assert!(matches!(
            ctx.apply(person, &attributes),
            Err(Error::Query(QueryError::UnknownField { .. }))
        ));
        assert!(person.get(&ctx).unwrap().get("age").is_none());
    }

    #[test]
    fn test_fetch_sees_pending_and_reuses_handles() {
        let mut ctx = WorkingContext::new(coordinator());
        let saved = ctx.insert("Person").unwrap();
        ctx.set_value(saved, "age", 30).unwrap();
        assert!(ctx.save());

        let pending = ctx.insert("Person").unwrap();
        ctx.set_value(pending, "age", 20).unwrap();

        let handles = ctx.fetch(&person_spec(&ctx, Query::new().order("age"))).unwrap();
        assert_eq!(handles, vec![pending, saved]);
        assert_eq!(ctx.count(&person_spec(&ctx, Query::new())).unwrap(), 2);
    }

    #[test]
    fn test_delete_then_save_purges() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        assert!(ctx.save());

        person.delete(&mut ctx).unwrap();
        assert!(ctx.fetch(&person_spec(&ctx, Query::new())).unwrap().is_empty());
        assert!(person.save(&mut ctx));
        assert_eq!(person.get(&ctx).unwrap().state(), RecordState::Purged);
        assert!(matches!(
            ctx.set_value(person, "age", 1),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(ctx.count(&person_spec(&ctx, Query::new())).unwrap(), 0);
    }

    #[test]
    fn test_delete_unsaved_never_reaches_store() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        person.delete(&mut ctx).unwrap();
        assert!(ctx.change_set().0.is_empty());
        assert!(!ctx.has_changes());
        assert!(ctx.save());
        assert_eq!(person.get(&ctx).unwrap().state(), RecordState::Purged);
    }

    #[test]
    fn test_failed_save_preserves_state() {
        let mut ctx = WorkingContext::new(coordinator());
        let person = ctx.insert("Person").unwrap();
        let badge = ctx.insert("Badge").unwrap();

        assert!(!ctx.save());
        assert!(ctx.has_changes());
        assert_eq!(person.get(&ctx).unwrap().state(), RecordState::Unsaved);

        ctx.set_value(badge, "label", "gold").unwrap();
        assert!(ctx.save());
        assert!(person.get(&ctx).unwrap().object_id().is_some());
    }

    #[test]
    fn test_foreign_handle_is_stale() {
        let coordinator = coordinator();
        let mut first = WorkingContext::new(Rc::clone(&coordinator));
        let second = WorkingContext::new(coordinator);
        let person = first.insert("Person").unwrap();
        assert!(matches!(person.get(&second), Err(Error::StaleHandle { .. })));
    }

    #[test]
    fn test_invalidated_coordinator_makes_context_stale() {
        let coordinator = coordinator();
        let mut ctx = WorkingContext::new(Rc::clone(&coordinator));
        let person = ctx.insert("Person").unwrap();
        coordinator.invalidate();

        assert!(!ctx.is_valid());
        assert!(matches!(person.get(&ctx), Err(Error::StaleHandle { .. })));
        assert!(matches!(
            ctx.fetch(&person_spec(&ctx, Query::matching(Predicate::True))),
            Err(Error::StaleHandle { .. })
        ));
        assert!(!ctx.save());
    }

    #[test]
    fn test_stale_context_rejects_save_without_changes() {
        let coordinator = coordinator();
        let mut ctx = WorkingContext::new(Rc::clone(&coordinator));
        let person = ctx.insert("Person").unwrap();
        assert!(person.save(&mut ctx));
        assert_eq!(ctx.records().unwrap().count(), 1);
        coordinator.invalidate();

        assert!(!ctx.has_changes());
        assert!(matches!(ctx.try_save(), Err(Error::StaleHandle { .. })));
        assert!(matches!(
            person.try_save(&mut ctx),
            Err(Error::StaleHandle { .. })
        ));
        assert!(!person.save(&mut ctx));
        assert!(matches!(ctx.records(), Err(Error::StaleHandle { .. })));
    }

    #[test]
    fn test_foreign_handle_save_is_stale() {
        let coordinator = coordinator();
        let mut first = WorkingContext::new(Rc::clone(&coordinator));
        let mut second = WorkingContext::new(coordinator);
        let person = first.insert("Person").unwrap();
        assert!(matches!(
            person.try_save(&mut second),
            Err(Error::StaleHandle { .. })
        ));
        assert_eq!(person.get(&first).unwrap().state(), RecordState::Unsaved);
    }
}
