//! Store coordinators and the persistence coordinator.
//!
//! A [`StoreCoordinator`] wraps one opened store. The
//! [`PersistenceCoordinator`] owns the schema, the active store
//! coordinator, and the default working context, and replaces the latter
//! two wholesale on reset or when switching to an in-memory store.

use crate::core::schema::SchemaModel;
use crate::error::{Error, Result};
use crate::persistence::config::StoreConfig;
use crate::persistence::context::WorkingContext;
use crate::storage::{Store, StoreKind, StoreStats, open_store, remove_store_file};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COORDINATOR_ID: AtomicU64 = AtomicU64::new(1);

/// One opened store bound to a schema model.
///
/// Invalidating the coordinator closes its store; every context bound to
/// it then reports stale handles.
pub struct StoreCoordinator {
    id: u64,
    kind: StoreKind,
    location: Option<PathBuf>,
    schema: Arc<SchemaModel>,
    store: RefCell<Option<Box<dyn Store>>>,
}

impl StoreCoordinator {
    /// Opens a store of `kind` for `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(
        kind: StoreKind,
        schema: Arc<SchemaModel>,
        location: Option<&Path>,
        auto_migrate: bool,
    ) -> Result<Self> {
        let store = open_store(kind, Arc::clone(&schema), location, auto_migrate)?;
        Ok(Self {
            id: NEXT_COORDINATOR_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            location: store.location().map(Path::to_path_buf),
            schema,
            store: RefCell::new(Some(store)),
        })
    }

    /// Unique id of this coordinator.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Kind of the wrapped store.
    #[must_use]
    pub const fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Backing file of the wrapped store, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Schema model the store was created from.
    #[must_use]
    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// True until [`Self::invalidate`] is called.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.store.borrow().is_some()
    }

    /// Closes the store. Subsequent access fails with a stale-handle error.
    pub fn invalidate(&self) {
        if self.store.borrow_mut().take().is_some() {
            tracing::debug!(coordinator = self.id, kind = %self.kind, "store coordinator invalidated");
        }
    }

    /// Runs `f` against the wrapped store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the coordinator has been
    /// invalidated, or whatever `f` returns.
    pub fn with_store<T>(&self, f: impl FnOnce(&dyn Store) -> Result<T>) -> Result<T> {
        let store = self.store.borrow();
        let store = store.as_deref().ok_or_else(|| {
            Error::stale(format!("store coordinator {} has been replaced", self.id))
        })?;
        f(store)
    }
}

/// Owner of the persistence stack.
///
/// Holds the schema model, the active [`StoreCoordinator`] and the default
/// [`WorkingContext`]. Construct one with [`PersistenceCoordinator::open`]
/// and pass it to the finder operations that need it.
///
/// # Examples
///
/// ```
/// use recordkit::{AttributeType, EntityDescription, PersistenceCoordinator, SchemaModel, StoreConfig};
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
/// let person = stack.context_mut().insert("Person").unwrap();
/// stack.context_mut().set_value(person, "name", "John").unwrap();
/// assert!(stack.save_context());
/// ```
pub struct PersistenceCoordinator {
    config: StoreConfig,
    schema: Arc<SchemaModel>,
    store_path: PathBuf,
    coordinator: Rc<StoreCoordinator>,
    context: WorkingContext,
    generation: u64,
}

impl PersistenceCoordinator {
    /// Loads the schema, opens the on-disk store and creates the default
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the schema or store location is
    /// unusable, or a storage error if the store cannot be opened.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let schema = config.load_schema()?;
        let store_path = config.store_path()?;
        let coordinator = Rc::new(StoreCoordinator::open(
            StoreKind::OnDisk,
            Arc::clone(&schema),
            Some(&store_path),
            config.auto_migrate,
        )?);
        tracing::info!(path = %store_path.display(), app = %config.app_name, "persistence stack ready");

        Ok(Self {
            context: WorkingContext::new(Rc::clone(&coordinator)),
            config,
            schema,
            store_path,
            coordinator,
            generation: 0,
        })
    }

    fn replace(&mut self, coordinator: StoreCoordinator) {
        let coordinator = Rc::new(coordinator);
        self.context = WorkingContext::new(Rc::clone(&coordinator));
        self.coordinator = coordinator;
        self.generation += 1;
    }

    /// Switches to a transient in-memory store bound to the same schema.
    ///
    /// The previous store coordinator is invalidated and the default
    /// context replaced; handles obtained before the switch become stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory store cannot be created. The
    /// previous store stays active in that case.
    pub fn use_in_memory_store(&mut self) -> Result<()> {
        let coordinator =
            StoreCoordinator::open(StoreKind::InMemory, Arc::clone(&self.schema), None, true)?;
        self.coordinator.invalidate();
        self.replace(coordinator);
        tracing::info!(generation = self.generation, "switched to in-memory store");
        Ok(())
    }

    /// Deletes the on-disk store file and starts over with a fresh store
    /// and default context.
    ///
    /// Failure to remove the file is logged and otherwise ignored. Every
    /// previously obtained context and handle becomes stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the fresh store cannot be opened; the stack is
    /// unusable until a later reset succeeds.
    pub fn delete_store_and_reset(&mut self) -> Result<()> {
        self.coordinator.invalidate();

        if let Err(e) = remove_store_file(&self.store_path) {
            tracing::warn!(path = %self.store_path.display(), error = %e, "store file not removed");
        }

        let coordinator = StoreCoordinator::open(
            StoreKind::OnDisk,
            Arc::clone(&self.schema),
            Some(&self.store_path),
            self.config.auto_migrate,
        )?;
        self.replace(coordinator);
        tracing::info!(
            path = %self.store_path.display(),
            generation = self.generation,
            "store reset"
        );
        Ok(())
    }

    /// Alias for [`Self::delete_store_and_reset`].
    ///
    /// # Errors
    ///
    /// See [`Self::delete_store_and_reset`].
    pub fn reset(&mut self) -> Result<()> {
        self.delete_store_and_reset()
    }

    /// Commits the default context.
    ///
    /// Returns true when there was nothing to save or the commit
    /// succeeded. On failure the error is logged, false is returned, and
    /// all pending changes are kept.
    pub fn save_context(&mut self) -> bool {
        self.context.save()
    }

    /// Commits the default context, returning the failure detail.
    ///
    /// # Errors
    ///
    /// Returns the commit error; pending changes are kept.
    pub fn try_save_context(&mut self) -> Result<()> {
        self.context.try_save()
    }

    /// Creates an additional working context on the active store.
    #[must_use]
    pub fn new_context(&self) -> WorkingContext {
        WorkingContext::new(Rc::clone(&self.coordinator))
    }

    /// The schema model.
    #[must_use]
    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// The configuration the stack was opened with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The active store coordinator.
    #[must_use]
    pub const fn store_coordinator(&self) -> &Rc<StoreCoordinator> {
        &self.coordinator
    }

    /// Kind of the active store.
    #[must_use]
    pub fn store_kind(&self) -> StoreKind {
        self.coordinator.kind()
    }

    /// Backing file of the active store; `None` while in memory.
    #[must_use]
    pub fn store_path(&self) -> Option<&Path> {
        self.coordinator.location()
    }

    /// The default working context.
    #[must_use]
    pub const fn context(&self) -> &WorkingContext {
        &self.context
    }

    /// The default working context, mutably.
    pub const fn context_mut(&mut self) -> &mut WorkingContext {
        &mut self.context
    }

    /// Number of times the store has been replaced.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Statistics of the active store.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics cannot be gathered.
    pub fn stats(&self) -> Result<StoreStats> {
        self.coordinator.with_store(|store| store.stats())
    }
}

impl std::fmt::Debug for PersistenceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceCoordinator")
            .field("app_name", &self.config.app_name)
            .field("store_path", &self.store_path)
            .field("store_kind", &self.coordinator.kind())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{AttributeType, EntityDescription};
    use crate::query::{FetchSpec, Query};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> PersistenceCoordinator {
        let schema = SchemaModel::new(vec![
            EntityDescription::new("Person").attribute("name", AttributeType::String),
        ])
        .unwrap();
        PersistenceCoordinator::open(StoreConfig::new("Test", schema).with_directory(dir.path()))
            .unwrap()
    }

    fn count_people(stack: &PersistenceCoordinator) -> usize {
        let spec = FetchSpec::build(stack.schema().entity("Person").unwrap(), Query::new()).unwrap();
        stack.context().count(&spec).unwrap()
    }

    #[test]
    fn test_open_creates_store_file() {
        let dir = TempDir::new().unwrap();
        let stack = open(&dir);
        assert_eq!(stack.store_kind(), StoreKind::OnDisk);
        assert_eq!(stack.store_path(), Some(dir.path().join("Test.sqlite").as_path()));
        assert!(dir.path().join("Test.sqlite").exists());
        assert_eq!(stack.generation(), 0);
    }

    #[test]
    fn test_save_context_without_changes() {
        let dir = TempDir::new().unwrap();
        let mut stack = open(&dir);
        assert!(!stack.context().has_changes());
        assert!(stack.save_context());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut stack = open(&dir);
            stack.context_mut().insert("Person").unwrap();
            assert!(stack.save_context());
        }
        let stack = open(&dir);
        assert_eq!(count_people(&stack), 1);
    }

    #[test]
    fn test_reset_clears_data_and_stales_handles() {
        let dir = TempDir::new().unwrap();
        let mut stack = open(&dir);
        let person = stack.context_mut().insert("Person").unwrap();
        assert!(stack.save_context());
        let old_context = stack.new_context();

        stack.reset().unwrap();
        assert_eq!(stack.generation(), 1);
        assert_eq!(count_people(&stack), 0);
        assert!(matches!(person.get(stack.context()), Err(Error::StaleHandle { .. })));
        assert!(!old_context.is_valid());
    }

    #[test]
    fn test_in_memory_switch_then_reset() {
        let dir = TempDir::new().unwrap();
        let mut stack = open(&dir);
        let on_disk = stack.context_mut().insert("Person").unwrap();
        assert!(stack.save_context());

        stack.use_in_memory_store().unwrap();
        assert_eq!(stack.store_kind(), StoreKind::InMemory);
        assert!(stack.store_path().is_none());
        assert_eq!(count_people(&stack), 0);
        assert!(matches!(on_disk.get(stack.context()), Err(Error::StaleHandle { .. })));

        stack.context_mut().insert("Person").unwrap();
        assert!(stack.save_context());
        assert_eq!(count_people(&stack), 1);

        stack.reset().unwrap();
        assert_eq!(stack.store_kind(), StoreKind::OnDisk);
        assert_eq!(count_people(&stack), 0);
    }

    #[test]
    fn test_stats_reports_counts() {
        let dir = TempDir::new().unwrap();
        let mut stack = open(&dir);
        stack.context_mut().insert("Person").unwrap();
        stack.try_save_context().unwrap();

        let stats = stack.stats().unwrap();
        assert_eq!(stats.entity_counts, vec![("Person".to_string(), 1)]);
    }
}
