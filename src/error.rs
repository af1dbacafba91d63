//! Error types for recordkit operations.
//!
//! This module provides the error hierarchy using `thiserror` for schema
//! loading, query translation, storage access, and record lifecycle
//! violations.

use thiserror::Error;

/// Result type alias for recordkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend errors (open, fetch, commit, file removal).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Condition, ordering, or attribute translation errors.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Schema model errors.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// A record handle or context outlived the store it was bound to.
    #[error("stale handle: {message}")]
    StaleHandle {
        /// Description of the stale access.
        message: String,
    },

    /// Operation not allowed in the record's current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors. Fatal at startup.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be opened.
    #[error("failed to open store at {path}: {reason}")]
    Open {
        /// Store location (`:memory:` for transient stores).
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Store layout does not match the schema and cannot be migrated.
    #[error("migration error: {0}")]
    Migration(String),

    /// Committing pending changes failed; nothing was written.
    #[error("commit failed: {0}")]
    Commit(String),

    /// Executing a fetch or count failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The on-disk store file could not be removed.
    #[error("failed to remove store file {path}: {reason}")]
    RemoveFile {
        /// Path of the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors raised while translating caller input into a fetch or mutation.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Entity is not part of the schema model.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// Entity name that was requested.
        name: String,
    },

    /// Field is not defined on the entity.
    #[error("unknown field '{field}' on entity {entity}")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Field name that was referenced.
        field: String,
    },

    /// Condition value has a shape that cannot become a filter.
    #[error("unsupported condition: {shape}")]
    UnsupportedCondition {
        /// Description of the rejected input.
        shape: String,
    },

    /// Order value has a shape that cannot become sort descriptors.
    #[error("unsupported order: {shape}")]
    UnsupportedOrder {
        /// Description of the rejected input.
        shape: String,
    },

    /// Value cannot be coerced to the field's type.
    #[error("cannot assign {found} to field '{field}' of type {expected}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Expected field type.
        expected: String,
        /// Description of the supplied value.
        found: String,
    },
}

/// Schema model validation errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Name is not usable as a table or column identifier.
    #[error("invalid identifier: {name}")]
    InvalidIdentifier {
        /// Offending name.
        name: String,
    },

    /// Two entities share a name.
    #[error("duplicate entity: {name}")]
    DuplicateEntity {
        /// Entity name.
        name: String,
    },

    /// Two fields of one entity share a name.
    #[error("duplicate field '{field}' on entity {entity}")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Field uses the reserved primary key name.
    #[error("field '{field}' on entity {entity} uses a reserved name")]
    ReservedField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Relationship points at an entity that does not exist.
    #[error("relationship '{field}' on {entity} targets unknown entity {destination}")]
    UnknownDestination {
        /// Entity name.
        entity: String,
        /// Relationship name.
        field: String,
        /// Missing destination entity.
        destination: String,
    },

    /// Schema definition could not be parsed.
    #[error("invalid schema definition: {0}")]
    Parse(String),
}

/// CLI command errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl Error {
    /// Builds a stale-handle error.
    pub(crate) fn stale(message: impl Into<String>) -> Self {
        Self::StaleHandle {
            message: message.into(),
        }
    }

    /// Builds an invalid-state error.
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Builds a configuration error.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "record purged".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: record purged");

        let err = Error::stale("context 3 was reset");
        assert_eq!(err.to_string(), "stale handle: context 3 was reset");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Open {
            path: "/tmp/app.sqlite".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to open store at /tmp/app.sqlite: permission denied"
        );

        let err = StorageError::Commit("NOT NULL constraint failed".to_string());
        assert!(err.to_string().starts_with("commit failed"));
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::UnknownField {
            entity: "Person".to_string(),
            field: "age".to_string(),
        };
        assert_eq!(err.to_string(), "unknown field 'age' on entity Person");

        let err = QueryError::TypeMismatch {
            field: "age".to_string(),
            expected: "integer".to_string(),
            found: "text \"old\"".to_string(),
        };
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::UnknownDestination {
            entity: "Person".to_string(),
            field: "employer".to_string(),
            destination: "Company".to_string(),
        };
        assert!(err.to_string().contains("Company"));
    }

    #[test]
    fn test_error_from_storage() {
        let err: Error = StorageError::Fetch("no such column".to_string()).into();
        assert!(matches!(err, Error::Storage(StorageError::Fetch(_))));
    }

    #[test]
    fn test_error_from_query() {
        let err: Error = QueryError::UnknownEntity {
            name: "Ghost".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_error_config() {
        let err = Error::config("no schema");
        assert_eq!(err.to_string(), "configuration error: no schema");
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));

        let err: StorageError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: SchemaError = json_err.into();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn test_command_error_display() {
        let err: Error = CommandError::InvalidArgument("attributes must be a JSON object".to_string()).into();
        assert_eq!(
            err.to_string(),
            "command error: invalid argument: attributes must be a JSON object"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
