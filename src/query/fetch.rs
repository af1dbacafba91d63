//! Fetch specifications.
//!
//! A [`Query`] gathers the caller's condition, order and limit. Building
//! a [`FetchSpec`] from it translates and validates each part against the
//! target entity; the resulting spec is what the store executes.

use crate::core::schema::EntityDescription;
use crate::error::QueryError;
use crate::query::order::{Order, SortDescriptor};
use crate::query::predicate::{Condition, Predicate};

/// Caller-side description of a fetch.
///
/// Every finder shape (condition only, with order, with limit, with both)
/// is a `Query` with the corresponding parts set.
///
/// # Examples
///
/// ```
/// use recordkit::Query;
///
/// let query = Query::new()
///     .filter("age > 30")
///     .order("lastName ASC, firstName")
///     .limit(10);
/// assert_eq!(query.limit_value(), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    condition: Option<Condition>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    /// Empty query: no filter, no order, no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query with a condition.
    pub fn matching(condition: impl Into<Condition>) -> Self {
        Self::new().filter(condition)
    }

    /// Sets the condition.
    #[must_use]
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Sets the order.
    #[must_use]
    pub fn order(mut self, order: impl Into<Order>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Sets an optional order.
    #[must_use]
    pub fn maybe_order(mut self, order: Option<Order>) -> Self {
        self.order = order;
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets an optional cap.
    #[must_use]
    pub const fn maybe_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// The condition, if any.
    #[must_use]
    pub const fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// The order, if any.
    #[must_use]
    pub const fn order_value(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// The limit, if any.
    #[must_use]
    pub const fn limit_value(&self) -> Option<usize> {
        self.limit
    }
}

/// A validated fetch against one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSpec {
    entity: String,
    filter: Option<Predicate>,
    ordering: Vec<SortDescriptor>,
    limit: Option<usize>,
}

impl FetchSpec {
    /// Unfiltered, unordered, unlimited fetch of `entity`.
    #[must_use]
    pub fn all(entity: &EntityDescription) -> Self {
        Self {
            entity: entity.name.clone(),
            filter: None,
            ordering: Vec::new(),
            limit: None,
        }
    }

    /// Translates `query` into a spec for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if the condition or order names
    /// a field the entity does not have.
    pub fn build(entity: &EntityDescription, query: Query) -> Result<Self, QueryError> {
        let filter = query
            .condition
            .map(|condition| condition.into_predicate(entity))
            .transpose()?;
        let ordering = match &query.order {
            Some(order) => order.resolve(entity)?,
            None => Vec::new(),
        };

        Ok(Self {
            entity: entity.name.clone(),
            filter,
            ordering,
            limit: query.limit,
        })
    }

    /// Target entity name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Filter expression, if any.
    #[must_use]
    pub const fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    /// Sort descriptors, highest priority first.
    #[must_use]
    pub fn ordering(&self) -> &[SortDescriptor] {
        &self.ordering
    }

    /// Result cap, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::AttributeType;

    fn person() -> EntityDescription {
        EntityDescription::new("Person")
            .attribute("name", AttributeType::String)
            .attribute("age", AttributeType::Integer)
    }

    #[test]
    fn test_build_full_query() {
        let query = Query::matching(Predicate::gt("age", 18))
            .order("age DESC, name")
            .limit(5);
        let spec = FetchSpec::build(&person(), query).unwrap();

        assert_eq!(spec.entity(), "Person");
        assert_eq!(spec.filter(), Some(&Predicate::gt("age", 18)));
        assert_eq!(
            spec.ordering(),
            &[SortDescriptor::desc("age"), SortDescriptor::asc("name")]
        );
        assert_eq!(spec.limit(), Some(5));
    }

    #[test]
    fn test_build_empty_query() {
        let spec = FetchSpec::build(&person(), Query::new()).unwrap();
        assert_eq!(spec, FetchSpec::all(&person()));
    }

    #[test]
    fn test_build_rejects_unknown_order_field() {
        let query = Query::new().order("height DESC");
        assert!(matches!(
            FetchSpec::build(&person(), query),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_zero_limit_kept() {
        let spec = FetchSpec::build(&person(), Query::new().limit(0)).unwrap();
        assert_eq!(spec.limit(), Some(0));
    }
}
