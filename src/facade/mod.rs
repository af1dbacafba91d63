//! Record query facade.
//!
//! Class-level create, find, count and delete operations. [`Finder`] does
//! the work for an entity named at runtime; [`ActiveRecord`] exposes the
//! same operations on domain types.

pub mod active_record;
pub mod finder;

pub use active_record::ActiveRecord;
pub use finder::Finder;
