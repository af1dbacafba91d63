//! Query construction.
//!
//! Translates loosely-typed condition, order, and limit arguments into a
//! validated [`FetchSpec`]. Nothing here touches storage.

pub mod fetch;
pub mod order;
pub mod predicate;

pub use fetch::{FetchSpec, Query};
pub use order::{Order, SortDescriptor, is_ascending};
pub use predicate::{Comparison, Condition, Predicate};
