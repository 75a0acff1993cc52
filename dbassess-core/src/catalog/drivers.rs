//! Driver metadata store.
//!
//! The bundled `dbdriver.dump` resource seeds the store. Once a driver is
//! marked as stored the whole store is written to the working directory,
//! and later loads prefer that copy.

use std::path::{Path, PathBuf};

use super::{Catalog, names, rows};
use crate::Result;
use crate::config::StoreConfig;
use crate::dump::{self, EscapePolicy};
use crate::models::DbDriver;
use crate::persist;

/// Fields whose values are written with the narrower escaping of the
/// shipped driver file.
const URL_FIELDS: &[&str] = &["URL_TEMPLATE", "BASE_URL_TEMPLATE"];

/// Driver records in file order, with their persisted location.
#[derive(Debug, Clone)]
pub struct DriverStore {
    drivers: Vec<DbDriver>,
    path: PathBuf,
}

impl DriverStore {
    /// Loads the persisted store, falling back to the bundled resource when
    /// no persisted copy exists or it holds no drivers.
    pub fn load(catalog: &Catalog, config: &StoreConfig) -> Self {
        let path = config.driver_path();

        let persisted = match persist::read_if_exists(&path) {
            Ok(Some(bytes)) => dump::rows_of(dump::decode(&bytes), names::DB_DRIVER_TABLE)
                .iter()
                .filter_map(rows::db_driver)
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted driver store unreadable");
                Vec::new()
            }
        };

        let drivers = if persisted.is_empty() {
            catalog
                .load_rows(names::DB_DRIVER, names::DB_DRIVER_TABLE)
                .iter()
                .filter_map(rows::db_driver)
                .collect()
        } else {
            persisted
        };

        tracing::debug!(drivers = drivers.len(), "Loaded driver store");
        Self { drivers, path }
    }

    /// Creates a store from records, persisting to `path`.
    pub fn from_drivers(drivers: Vec<DbDriver>, path: impl Into<PathBuf>) -> Self {
        Self {
            drivers,
            path: path.into(),
        }
    }

    /// Looks up a driver by id.
    pub fn by_id(&self, id: i64) -> Option<&DbDriver> {
        self.drivers.iter().find(|d| d.id == id)
    }

    /// Drivers for one datasource type, in file order.
    pub fn by_type(&self, datasource_type_id: i32) -> Vec<&DbDriver> {
        self.drivers
            .iter()
            .filter(|d| d.datasource_type_id == datasource_type_id)
            .collect()
    }

    /// Default driver of a datasource type.
    pub fn first_for_type(&self, datasource_type_id: i32) -> Option<&DbDriver> {
        self.drivers
            .iter()
            .find(|d| d.datasource_type_id == datasource_type_id)
    }

    /// Looks up a driver by name, ignoring case.
    pub fn by_name(&self, name: &str) -> Option<&DbDriver> {
        self.drivers
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Marks the named driver as supplied and saves the store.
    ///
    /// Returns `false` when no driver has that name. Nothing is written when
    /// the driver was already marked.
    ///
    /// # Errors
    /// Returns a persistence error when the store cannot be written.
    pub fn mark_stored(&mut self, name: &str) -> Result<bool> {
        let Some(driver) = self
            .drivers
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
        else {
            return Ok(false);
        };

        if !driver.driver_stored {
            driver.driver_stored = true;
            self.save()?;
        }
        Ok(true)
    }

    /// Writes the whole store to its working-directory file.
    ///
    /// # Errors
    /// Returns a persistence error when the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let table_rows: Vec<_> = self.drivers.iter().map(rows::db_driver_row).collect();
        let document = dump::encode_table(
            names::DB_DRIVER_TABLE,
            &table_rows,
            EscapePolicy::Legacy {
                url_fields: URL_FIELDS,
            },
        );
        persist::write_atomic(&self.path, &document, "driver store")?;
        tracing::info!(path = %self.path.display(), "Saved driver store");
        Ok(())
    }

    /// Location of the persisted store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All drivers in file order.
    pub fn iter(&self) -> impl Iterator<Item = &DbDriver> {
        self.drivers.iter()
    }

    /// Number of drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// True when no drivers loaded.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
