//! The `ActiveRecord` trait.

use crate::core::naming::entity_name_from_type;
use crate::core::value::Attributes;
use crate::error::Result;
use crate::facade::Finder;
use crate::persistence::{PersistenceCoordinator, RecordRef, WorkingContext};
use crate::query::{Condition, Order, Query};

/// Class-level finders for a domain type.
///
/// Implement it on a marker type named after the entity. Every operation
/// comes in a form taking the [`PersistenceCoordinator`], which works on
/// its default context, and a form taking an explicit [`WorkingContext`].
///
/// # Examples
///
/// ```
/// use recordkit::{
///     ActiveRecord, AttributeType, EntityDescription, PersistenceCoordinator, SchemaModel,
///     StoreConfig,
/// };
///
/// struct Person;
/// impl ActiveRecord for Person {}
///
/// let dir = tempfile::tempdir().unwrap();
/// let schema = SchemaModel::new(vec![
///     EntityDescription::new("Person").attribute("name", AttributeType::String),
/// ])
/// .unwrap();
/// let mut stack =
///     PersistenceCoordinator::open(StoreConfig::new("Doc", schema).with_directory(dir.path()))
///         .unwrap();
///
/// let john = Person::create(&mut stack).unwrap();
/// stack.context_mut().set_value(john, "name", "John").unwrap();
/// assert!(stack.save_context());
///
/// let found = Person::where_condition(&mut stack, "name == 'John'").unwrap();
/// assert_eq!(found, vec![john]);
/// assert_eq!(Person::count(&stack).unwrap(), 1);
/// ```
pub trait ActiveRecord {
    /// Entity name: the type name without its module path or generic
    /// arguments.
    fn entity_name() -> String {
        entity_name_from_type(std::any::type_name::<Self>()).to_string()
    }

    /// Finder bound to [`Self::entity_name`].
    fn finder() -> Finder {
        Finder::new(Self::entity_name())
    }

    /// New unsaved record in the default context.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the store was replaced.
    fn create(stack: &mut PersistenceCoordinator) -> Result<RecordRef> {
        Self::create_in_context(stack.context_mut())
    }

    /// New unsaved record in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the context is stale.
    fn create_in_context(ctx: &mut WorkingContext) -> Result<RecordRef> {
        Self::finder().create(ctx)
    }

    /// New record populated from `attributes`; `None` without attributes.
    ///
    /// # Errors
    ///
    /// See [`Finder::create_with`].
    fn create_with(
        attributes: Option<&Attributes>,
        ctx: &mut WorkingContext,
    ) -> Result<Option<RecordRef>> {
        Self::finder().create_with(attributes, ctx)
    }

    /// Every record in the default context.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn all(stack: &mut PersistenceCoordinator) -> Result<Vec<RecordRef>> {
        Self::all_in_context(stack.context_mut(), None)
    }

    /// Every record in the default context, ordered.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn all_with_order(
        stack: &mut PersistenceCoordinator,
        order: impl Into<Order>,
    ) -> Result<Vec<RecordRef>> {
        Self::all_in_context(stack.context_mut(), Some(order.into()))
    }

    /// Every record in `ctx`, optionally ordered.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn all_in_context(ctx: &mut WorkingContext, order: Option<Order>) -> Result<Vec<RecordRef>> {
        Self::finder().all(ctx, order)
    }

    /// Records matching `condition` in the default context.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn where_condition(
        stack: &mut PersistenceCoordinator,
        condition: impl Into<Condition>,
    ) -> Result<Vec<RecordRef>> {
        Self::where_in_context(stack.context_mut(), Query::matching(condition))
    }

    /// Records matching `query` (condition, order and limit) in the
    /// default context.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn where_with(stack: &mut PersistenceCoordinator, query: Query) -> Result<Vec<RecordRef>> {
        Self::where_in_context(stack.context_mut(), query)
    }

    /// Records matching `query` in `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Finder::fetch`].
    fn where_in_context(ctx: &mut WorkingContext, query: Query) -> Result<Vec<RecordRef>> {
        Self::finder().fetch(ctx, query)
    }

    /// Number of records in the default context.
    ///
    /// # Errors
    ///
    /// See [`Finder::count`].
    fn count(stack: &PersistenceCoordinator) -> Result<usize> {
        Self::count_in_context(stack.context())
    }

    /// Number of records in `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Finder::count`].
    fn count_in_context(ctx: &WorkingContext) -> Result<usize> {
        Self::finder().count(ctx, None)
    }

    /// Number of records in `ctx` matching `condition`.
    ///
    /// # Errors
    ///
    /// See [`Finder::count`].
    fn count_where(condition: impl Into<Condition>, ctx: &WorkingContext) -> Result<usize> {
        Self::finder().count(ctx, Some(condition.into()))
    }

    /// Marks every record in the default context deleted.
    ///
    /// # Errors
    ///
    /// See [`Finder::delete_all`].
    fn delete_all(stack: &mut PersistenceCoordinator) -> Result<usize> {
        Self::delete_all_in_context(stack.context_mut())
    }

    /// Marks every record in `ctx` deleted.
    ///
    /// # Errors
    ///
    /// See [`Finder::delete_all`].
    fn delete_all_in_context(ctx: &mut WorkingContext) -> Result<usize> {
        Self::finder().delete_all(ctx)
    }
}
