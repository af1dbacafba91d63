//! Store configuration.

use crate::core::schema::SchemaModel;
use crate::error::{Error, Result};
use crate::storage::STORE_FILE_EXTENSION;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the schema model comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A model built in code.
    Model(Arc<SchemaModel>),
    /// A JSON definition file.
    File(PathBuf),
    /// An inline JSON definition.
    Json(String),
}

impl From<SchemaModel> for SchemaSource {
    fn from(model: SchemaModel) -> Self {
        Self::Model(Arc::new(model))
    }
}

impl From<Arc<SchemaModel>> for SchemaSource {
    fn from(model: Arc<SchemaModel>) -> Self {
        Self::Model(model)
    }
}

/// Configuration for a [`PersistenceCoordinator`](super::PersistenceCoordinator).
///
/// # Examples
///
/// ```
/// use recordkit::{EntityDescription, SchemaModel, StoreConfig};
///
/// let schema = SchemaModel::new(vec![EntityDescription::new("Person")]).unwrap();
/// let config = StoreConfig::new("Contacts", schema).with_directory("/tmp/contacts");
/// assert_eq!(
///     config.store_path().unwrap(),
///     std::path::Path::new("/tmp/contacts/Contacts.sqlite")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Application name; also the store file stem.
    pub app_name: String,
    /// Directory holding the store file. Defaults to the platform data
    /// directory.
    pub directory: Option<PathBuf>,
    /// Schema model source.
    pub schema: SchemaSource,
    /// Add missing tables and columns when opening an existing store.
    pub auto_migrate: bool,
}

impl StoreConfig {
    /// Creates a configuration with the default directory and automatic
    /// migration enabled.
    pub fn new(app_name: impl Into<String>, schema: impl Into<SchemaSource>) -> Self {
        Self {
            app_name: app_name.into(),
            directory: None,
            schema: schema.into(),
            auto_migrate: true,
        }
    }

    /// Sets the store directory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Enables or disables automatic migration.
    #[must_use]
    pub const fn with_auto_migrate(mut self, auto_migrate: bool) -> Self {
        self.auto_migrate = auto_migrate;
        self
    }

    /// Resolves the on-disk store location, `<directory>/<app_name>.sqlite`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the app name is empty or contains a
    /// path separator, or if no directory is set and the platform has no
    /// data directory.
    pub fn store_path(&self) -> Result<PathBuf> {
        let name = self.app_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::config(format!(
                "invalid app name '{}'",
                self.app_name
            )));
        }

        let directory = match &self.directory {
            Some(directory) => directory.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| Error::config("no platform data directory; set a store directory"))?,
        };

        Ok(directory.join(format!("{name}.{STORE_FILE_EXTENSION}")))
    }

    /// Loads the schema model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the definition cannot be read or is
    /// invalid.
    pub fn load_schema(&self) -> Result<Arc<SchemaModel>> {
        let loaded = match &self.schema {
            SchemaSource::Model(model) => return Ok(Arc::clone(model)),
            SchemaSource::File(path) => SchemaModel::load(path).map_err(|e| describe(path, &e)),
            SchemaSource::Json(json) => {
                SchemaModel::from_json(json).map_err(|e| Error::config(e.to_string()))
            }
        };
        loaded.map(Arc::new)
    }
}

fn describe(path: &Path, err: &Error) -> Error {
    Error::config(format!("schema {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::EntityDescription;
    use tempfile::TempDir;
    use test_case::test_case;

    fn schema() -> SchemaModel {
        SchemaModel::new(vec![EntityDescription::new("Person")]).unwrap()
    }

    #[test]
    fn test_store_path_uses_app_name() {
        let config = StoreConfig::new("App", schema()).with_directory("/data");
        assert_eq!(config.store_path().unwrap(), PathBuf::from("/data/App.sqlite"));
    }

    #[test_case("" ; "empty")]
    #[test_case("a/b" ; "separator")]
    #[test_case(".." ; "parent")]
    fn test_store_path_rejects_bad_names(name: &str) {
        let config = StoreConfig::new(name, schema()).with_directory("/data");
        assert!(matches!(config.store_path(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_schema_sources() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let json = schema().to_json();
        std::fs::write(&path, &json).unwrap();

        let from_file = StoreConfig::new("App", SchemaSource::File(path)).load_schema().unwrap();
        let from_json = StoreConfig::new("App", SchemaSource::Json(json)).load_schema().unwrap();
        assert_eq!(from_file, from_json);
        assert!(from_file.entity("Person").is_ok());
    }

    #[test]
    fn test_load_schema_failure_is_config_error() {
        let missing = StoreConfig::new("App", SchemaSource::File(PathBuf::from("/nonexistent/model.json")));
        assert!(matches!(missing.load_schema(), Err(Error::Config { .. })));

        let invalid = StoreConfig::new("App", SchemaSource::Json("{".to_string()));
        assert!(matches!(invalid.load_schema(), Err(Error::Config { .. })));
    }
}
