//! Storage layer for recordkit.
//!
//! Provides persistent storage for records using `SQLite`. A store is
//! either a file on disk or a transient in-memory database; both are
//! created from the same [`SchemaModel`] and behave identically.

pub mod schema;
pub mod sql;
pub mod sqlite;
pub mod traits;

pub use schema::CURRENT_SCHEMA_VERSION;
pub use sqlite::SqliteStore;
pub use traits::{
    ChangeSet, PendingDelete, PendingInsert, PendingUpdate, Row, RowId, Store, StoreKind,
    StoreStats,
};

use crate::core::schema::SchemaModel;
use crate::error::{Result, StorageError};
use std::path::Path;
use std::sync::Arc;

/// File extension of on-disk stores.
pub const STORE_FILE_EXTENSION: &str = "sqlite";

/// Sidecar files `SQLite` keeps next to a WAL-mode database.
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Opens a store of `kind`.
///
/// `location` is required for [`StoreKind::OnDisk`] and ignored otherwise.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or migrated.
pub fn open_store(
    kind: StoreKind,
    schema: Arc<SchemaModel>,
    location: Option<&Path>,
    auto_migrate: bool,
) -> Result<Box<dyn Store>> {
    match (kind, location) {
        (StoreKind::OnDisk, Some(path)) => {
            Ok(Box::new(SqliteStore::open(path, schema, auto_migrate)?))
        }
        (StoreKind::OnDisk, None) => Err(StorageError::Open {
            path: String::new(),
            reason: "on-disk store requires a location".to_string(),
        }
        .into()),
        (StoreKind::InMemory, _) => Ok(Box::new(SqliteStore::in_memory(schema)?)),
    }
}

/// Removes a store file and its WAL sidecars.
///
/// Missing files are not an error.
///
/// # Errors
///
/// Returns [`StorageError::RemoveFile`] for the first file that exists but
/// cannot be removed. Removal of the remaining files is still attempted.
pub fn remove_store_file(path: &Path) -> Result<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in SIDECAR_SUFFIXES {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        targets.push(name.into());
    }

    let mut first_error = None;
    for target in targets.iter().filter(|t| t.exists()) {
        if let Err(e) = std::fs::remove_file(target) {
            tracing::warn!(path = %target.display(), error = %e, "failed to remove store file");
            first_error.get_or_insert(StorageError::RemoveFile {
                path: target.display().to_string(),
                reason: e.to_string(),
            });
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}
