//! `SQLite` storage implementation.
//!
//! Provides on-disk and in-memory stores with atomic commits. Pending
//! changes are made visible to fetches by staging them inside a
//! transaction that is always rolled back.

// SQLite stores all integers as i64. Counts are non-negative and fit usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::schema::{EntityDescription, PRIMARY_KEY, SchemaModel};
use crate::core::value::Value;
use crate::error::{Result, StorageError};
use crate::query::FetchSpec;
use crate::storage::schema::{migrate, quote, schema_version};
use crate::storage::sql::{count_sql, select_sql};
use crate::storage::traits::{ChangeSet, Row, RowId, Store, StoreKind, StoreStats};
use rusqlite::{Connection, params, params_from_iter};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Constraint handling while staging changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    /// Fail the statement.
    Abort,
    /// Skip the offending row.
    Skip,
}

impl Conflict {
    const fn clause(self) -> &'static str {
        match self {
            Self::Abort => "",
            Self::Skip => "OR IGNORE ",
        }
    }
}

/// SQLite-based store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use recordkit::{AttributeType, EntityDescription, SchemaModel};
/// use recordkit::storage::{SqliteStore, Store, StoreKind};
///
/// let schema = SchemaModel::new(vec![
///     EntityDescription::new("Person").attribute("name", AttributeType::String),
/// ])
/// .unwrap();
/// let store = SqliteStore::in_memory(Arc::new(schema)).unwrap();
/// assert_eq!(store.kind(), StoreKind::InMemory);
/// ```
pub struct SqliteStore {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
    schema: Arc<SchemaModel>,
}

impl SqliteStore {
    /// Opens or creates a store file at `path` and migrates it to `schema`.
    ///
    /// The parent directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<SchemaModel>, auto_migrate: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_error = |reason: String| StorageError::Open {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| open_error(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(|e| open_error(e.to_string()))?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(|e| open_error(e.to_string()))?;
        // journal_mode returns the new mode as a row
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(|e| open_error(e.to_string()))?;

        migrate(&conn, &schema, auto_migrate)?;
        tracing::debug!(path = %path.display(), "opened on-disk store");

        Ok(Self {
            conn,
            path: Some(path),
            schema,
        })
    }

    /// Creates a transient in-memory store for `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory(schema: Arc<SchemaModel>) -> Result<Self> {
        let open_error = |e: rusqlite::Error| StorageError::Open {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        };
        let conn = Connection::open_in_memory().map_err(open_error)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(open_error)?;

        migrate(&conn, &schema, true)?;
        tracing::debug!("opened in-memory store");

        Ok(Self {
            conn,
            path: None,
            schema,
        })
    }

    fn entity(&self, name: &str) -> Result<&EntityDescription> {
        Ok(self.schema.entity(name)?)
    }

    /// Applies `changes` to `conn`, returning the id of each insert.
    ///
    /// With `conflict` set to [`Conflict::Skip`], rows violating a
    /// constraint are left out and their id is `None`.
    fn stage(
        conn: &Connection,
        changes: &ChangeSet,
        conflict: Conflict,
    ) -> rusqlite::Result<Vec<Option<i64>>> {
        let or = conflict.clause();
        let mut inserted = Vec::with_capacity(changes.inserts.len());

        for insert in &changes.inserts {
            let table = quote(&insert.entity);
            let changed = if insert.values.is_empty() {
                conn.execute(&format!("INSERT {or}INTO {table} DEFAULT VALUES"), [])?
            } else {
                let columns: Vec<String> = insert.values.keys().map(|k| quote(k)).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                conn.execute(
                    &format!(
                        "INSERT {or}INTO {table} ({}) VALUES ({placeholders})",
                        columns.join(", ")
                    ),
                    params_from_iter(insert.values.values()),
                )?
            };
            inserted.push((changed > 0).then(|| conn.last_insert_rowid()));
        }

        for update in changes.updates.iter().filter(|u| !u.values.is_empty()) {
            let assignments: Vec<String> = update
                .values
                .keys()
                .map(|k| format!("{} = ?", quote(k)))
                .collect();
            let mut values: Vec<Value> = update.values.values().cloned().collect();
            values.push(Value::Integer(update.id));
            conn.execute(
                &format!(
                    "UPDATE {or}{} SET {} WHERE {PRIMARY_KEY} = ?",
                    quote(&update.entity),
                    assignments.join(", ")
                ),
                params_from_iter(values.iter()),
            )?;
        }

        for delete in &changes.deletes {
            conn.execute(
                &format!("DELETE FROM {} WHERE {PRIMARY_KEY} = ?", quote(&delete.entity)),
                params![delete.id],
            )?;
        }

        Ok(inserted)
    }

    /// Runs `query` with `pending` staged, then discards the staging.
    fn with_pending<T>(
        &self,
        pending: &ChangeSet,
        query: impl FnOnce(&Connection, &HashMap<i64, usize>) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let fetch_error = |e: rusqlite::Error| StorageError::Fetch(e.to_string());

        if pending.is_empty() {
            return query(&self.conn, &HashMap::new()).map_err(|e| fetch_error(e).into());
        }

        let tx = self.conn.unchecked_transaction().map_err(fetch_error)?;
        let staged: HashMap<i64, usize> = Self::stage(&tx, pending, Conflict::Skip)
            .map_err(fetch_error)?
            .into_iter()
            .enumerate()
            .filter_map(|(index, id)| id.map(|id| (id, index)))
            .collect();
        let result = query(&tx, &staged);
        tx.rollback().map_err(fetch_error)?;
        result.map_err(|e| fetch_error(e).into())
    }
}

impl Store for SqliteStore {
    fn kind(&self) -> StoreKind {
        if self.path.is_some() {
            StoreKind::OnDisk
        } else {
            StoreKind::InMemory
        }
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn fetch(&self, spec: &FetchSpec, pending: &ChangeSet) -> Result<Vec<Row>> {
        let entity = self.entity(spec.entity())?;
        let mut params = Vec::new();
        let sql = select_sql(entity, spec, &mut params);
        tracing::debug!(entity = %entity.name, %sql, "fetch");

        self.with_pending(pending, |conn, staged| {
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params_from_iter(params.iter()), |row| {
                let id: i64 = row.get(0)?;
                let mut values = BTreeMap::new();
                for (index, field) in entity.fields.iter().enumerate() {
                    let value = Value::from_column(row.get_ref(index + 1)?, &field.kind);
                    if !value.is_null() {
                        values.insert(field.name.clone(), value);
                    }
                }
                let id = staged
                    .get(&id)
                    .map_or(RowId::Stored(id), |index| RowId::Pending(*index));
                Ok(Row { id, values })
            })?
            .collect()
        })
    }

    fn count(&self, spec: &FetchSpec, pending: &ChangeSet) -> Result<usize> {
        let entity = self.entity(spec.entity())?;
        let mut params = Vec::new();
        let sql = count_sql(entity, spec, &mut params);
        tracing::debug!(entity = %entity.name, %sql, "count");

        self.with_pending(pending, |conn, _| {
            conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                row.get::<_, i64>(0)
            })
        })
        .map(|count| count as usize)
    }

    fn commit(&self, changes: &ChangeSet) -> Result<Vec<i64>> {
        let commit_error = |e: rusqlite::Error| StorageError::Commit(e.to_string());

        let tx = self.conn.unchecked_transaction().map_err(commit_error)?;
        let inserted: Vec<i64> = Self::stage(&tx, changes, Conflict::Abort)
            .map_err(commit_error)?
            .into_iter()
            .flatten()
            .collect();
        tx.commit().map_err(commit_error)?;

        tracing::debug!(
            inserted = changes.inserts.len(),
            updated = changes.updates.len(),
            deleted = changes.deletes.len(),
            "committed changes"
        );
        Ok(inserted)
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut entity_counts = Vec::with_capacity(self.schema.entities().len());
        for entity in self.schema.entities() {
            let count: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", quote(&entity.name)), [], |row| {
                    row.get(0)
                })
                .map_err(StorageError::from)?;
            entity_counts.push((entity.name.clone(), count as usize));
        }

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StoreStats {
            kind: self.kind(),
            path: self.path.as_ref().map(|p| p.display().to_string()),
            entity_counts,
            schema_version: schema_version(&self.conn)?.unwrap_or(0),
            db_size,
        })
    }
}
