//! Database schema definitions.
//!
//! Derives table DDL from the schema model and keeps an existing store in
//! line with it. Migration is additive only: missing tables are created and
//! missing columns are added.

use crate::core::schema::{EntityDescription, FieldDescription, FieldKind, PRIMARY_KEY, SchemaModel};
use crate::error::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

/// Current store layout version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Bookkeeping table, created before any entity table.
pub const SCHEMA_INFO_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// SQL to get a schema_info value.
pub const GET_INFO_SQL: &str = "SELECT value FROM schema_info WHERE key = ?";

/// SQL to set a schema_info value.
pub const SET_INFO_SQL: &str = "INSERT OR REPLACE INTO schema_info (key, value) VALUES (?, ?)";

/// Quotes an identifier for use in SQL.
///
/// Schema names are validated identifiers; quoting keeps SQL keywords such
/// as `order` usable as field names.
#[must_use]
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Column definition for one field.
#[must_use]
pub fn column_definition(field: &FieldDescription) -> String {
    match &field.kind {
        FieldKind::Attribute {
            attribute_type,
            optional,
        } => {
            let not_null = if *optional { "" } else { " NOT NULL" };
            format!("{} {}{not_null}", quote(&field.name), attribute_type.sql_type())
        }
        FieldKind::Relationship { destination } => format!(
            "{} INTEGER REFERENCES {}({PRIMARY_KEY}) ON DELETE SET NULL",
            quote(&field.name),
            quote(destination)
        ),
    }
}

/// `CREATE TABLE` statement for an entity.
#[must_use]
pub fn create_table_sql(entity: &EntityDescription) -> String {
    let mut columns = vec![format!("{PRIMARY_KEY} INTEGER PRIMARY KEY AUTOINCREMENT")];
    columns.extend(entity.fields.iter().map(column_definition));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote(&entity.name),
        columns.join(",\n    ")
    )
}

/// `ALTER TABLE ... ADD COLUMN` statement for a field added to the model.
///
/// `SQLite` cannot add a `NOT NULL` column without a default, so added
/// columns are always nullable.
#[must_use]
pub fn add_column_sql(entity: &EntityDescription, field: &FieldDescription) -> String {
    let definition = match &field.kind {
        FieldKind::Attribute { attribute_type, .. } => {
            format!("{} {}", quote(&field.name), attribute_type.sql_type())
        }
        FieldKind::Relationship { .. } => column_definition(field),
    };
    format!("ALTER TABLE {} ADD COLUMN {definition}", quote(&entity.name))
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |row| row.get(0),
        )
        .map_err(StorageError::from)?;
    Ok(count > 0)
}

fn existing_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote(table)))
        .map_err(StorageError::from)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(StorageError::from)?
        .collect::<std::result::Result<HashSet<_>, _>>()
        .map_err(StorageError::from)?;
    Ok(columns)
}

/// Reads the recorded layout version, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn schema_version(conn: &Connection) -> Result<Option<u32>> {
    let version: Option<String> = conn
        .query_row(GET_INFO_SQL, params!["version"], |row| row.get(0))
        .optional()
        .map_err(StorageError::from)?;
    Ok(version.and_then(|v| v.parse().ok()))
}

/// Brings the store in line with `schema`.
///
/// With `auto_migrate` off, a store whose tables lack columns the model
/// declares is rejected instead of altered.
///
/// # Errors
///
/// Returns [`StorageError::Migration`] if the store cannot be made to match.
pub fn migrate(conn: &Connection, schema: &SchemaModel, auto_migrate: bool) -> Result<()> {
    conn.execute_batch(SCHEMA_INFO_SQL)
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    for entity in schema.entities() {
        if !table_exists(conn, &entity.name)? {
            conn.execute_batch(&create_table_sql(entity))
                .map_err(|e| StorageError::Migration(format!("{}: {e}", entity.name)))?;
            continue;
        }

        let columns = existing_columns(conn, &entity.name)?;
        for field in entity.fields.iter().filter(|f| !columns.contains(&f.name)) {
            if !auto_migrate {
                return Err(StorageError::Migration(format!(
                    "store table {} has no column {} and auto-migration is disabled",
                    entity.name, field.name
                ))
                .into());
            }
            tracing::debug!(entity = %entity.name, field = %field.name, "adding column");
            conn.execute_batch(&add_column_sql(entity, field))
                .map_err(|e| StorageError::Migration(format!("{}.{}: {e}", entity.name, field.name)))?;
        }
    }

    conn.execute(SET_INFO_SQL, params!["version", CURRENT_SCHEMA_VERSION.to_string()])
        .map_err(StorageError::from)?;
    conn.execute(SET_INFO_SQL, params!["model", schema.to_json()])
        .map_err(StorageError::from)?;

    Ok(())
}
