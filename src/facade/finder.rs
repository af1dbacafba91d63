//! Finder operations for one entity.
//!
//! [`Finder`] carries the entity name and implements every facade
//! operation against an explicit [`WorkingContext`]. The
//! [`ActiveRecord`](super::ActiveRecord) trait delegates to it, and the
//! CLI uses it directly for entities named at runtime.

use crate::core::value::Attributes;
use crate::error::Result;
use crate::persistence::{RecordRef, WorkingContext};
use crate::query::{Condition, FetchSpec, Order, Query};

/// Finder for the entity named `entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finder {
    entity: String,
}

impl Finder {
    /// Creates a finder for `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
        }
    }

    /// Entity name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Registers a new unsaved record.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the context is stale.
    pub fn create(&self, ctx: &mut WorkingContext) -> Result<RecordRef> {
        ctx.insert(&self.entity)
    }

    /// Registers a new record populated from `attributes`.
    ///
    /// Returns `Ok(None)` when `attributes` is `None`. The record is
    /// discarded again if any attribute cannot be applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown, an attribute names no
    /// field or cannot be coerced, or the context is stale.
    pub fn create_with(
        &self,
        attributes: Option<&Attributes>,
        ctx: &mut WorkingContext,
    ) -> Result<Option<RecordRef>> {
        let Some(attributes) = attributes else {
            return Ok(None);
        };
        let record = ctx.insert(&self.entity)?;
        if let Err(e) = ctx.apply(record, attributes) {
            // Never committed; purged on the next save.
            ctx.delete(record)?;
            return Err(e);
        }
        Ok(Some(record))
    }

    fn spec(&self, ctx: &WorkingContext, query: Query) -> Result<FetchSpec> {
        let entity = ctx.schema().entity(&self.entity)?;
        Ok(FetchSpec::build(entity, query)?)
    }

    /// Executes `query` and returns the matching records in order.
    ///
    /// Zero matches is an empty vector; translation or execution failures
    /// are logged and returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition or order cannot be translated, or
    /// the store rejects the fetch.
    pub fn fetch(&self, ctx: &mut WorkingContext, query: Query) -> Result<Vec<RecordRef>> {
        let result = self
            .spec(ctx, query)
            .and_then(|spec| ctx.fetch(&spec));
        if let Err(e) = &result {
            tracing::error!(entity = %self.entity, error = %e, "fetch failed");
        }
        result
    }

    /// All records, optionally ordered.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch`].
    pub fn all(&self, ctx: &mut WorkingContext, order: Option<Order>) -> Result<Vec<RecordRef>> {
        self.fetch(ctx, Query::new().maybe_order(order))
    }

    /// Counts matching records without materializing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition cannot be translated or the store
    /// rejects the count.
    pub fn count(&self, ctx: &WorkingContext, condition: Option<Condition>) -> Result<usize> {
        let query = match condition {
            Some(condition) => Query::matching(condition),
            None => Query::new(),
        };
        let result = self.spec(ctx, query).and_then(|spec| ctx.count(&spec));
        if let Err(e) = &result {
            tracing::error!(entity = %self.entity, error = %e, "count failed");
        }
        result
    }

    /// Fetches every record and marks each one deleted. Returns how many
    /// were marked.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or a record cannot be deleted.
    pub fn delete_all(&self, ctx: &mut WorkingContext) -> Result<usize> {
        let records = self.all(ctx, None)?;
        for record in &records {
            ctx.delete(*record)?;
        }
        tracing::debug!(entity = %self.entity, count = records.len(), "marked for deletion");
        Ok(records.len())
    }
}
