//! User-configured datasource profiles.
//!
//! Profiles persist to `datasource.dump` in the working directory as table
//! `DATASOURCE`.
//!
//! # Security Guarantees
//! - `PASSWORD` is always written empty; passwords do not survive a restart
//! - Passwords inside `CUSTOM_URL` and `CON_PROPERTY` are stripped on save
//! - Registry files are written with owner-only permissions

use std::path::{Path, PathBuf};

use crate::Result;
use crate::config::StoreConfig;
use crate::dump::{self, EscapePolicy, Row};
use crate::error::strip_database_credentials;
use crate::models::{DEFAULT_DATASOURCE_SEVERITY, Datasource};
use crate::persist;
use crate::security::Credentials;

/// Table name inside the registry file.
pub const DATASOURCE_TABLE: &str = "DATASOURCE";

/// First id handed out by a fresh registry.
pub const FIRST_DATASOURCE_ID: i64 = 20001;

/// Connection profiles keyed by unique name, in insertion order.
///
/// # Example
/// ```rust
/// use dbassess_core::models::Datasource;
/// use dbassess_core::registry::DatasourceRegistry;
///
/// let dir = tempfile::tempdir()?;
/// let mut registry = DatasourceRegistry::new(dir.path().join("datasource.dump"));
///
/// let id = registry.add(Datasource::new("orders", 15, "db1", 0));
/// assert_eq!(registry.add(Datasource::new("orders", 15, "db2", 0)), id);
/// assert_eq!(registry.list().len(), 1);
///
/// registry.save()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatasourceRegistry {
    path: PathBuf,
    datasources: Vec<Datasource>,
    next_id: i64,
}

impl DatasourceRegistry {
    /// Creates an empty registry persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            datasources: Vec::new(),
            next_id: FIRST_DATASOURCE_ID,
        }
    }

    /// Creates the registry for `config` and loads its file.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let mut registry = Self::new(config.datasource_path());
        registry.load()?;
        Ok(registry)
    }

    /// Loads profiles from the registry file.
    ///
    /// A missing file means no profiles yet. A malformed file loads as
    /// empty with a warning. Loaded profiles receive fresh ids in file
    /// order.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn load(&mut self) -> Result<()> {
        let Some(bytes) = persist::read_if_exists(&self.path)? else {
            tracing::debug!(path = %self.path.display(), "No datasource registry yet");
            return Ok(());
        };

        let tables = dump::decode(&bytes);
        if tables.is_empty() && !bytes.is_empty() {
            tracing::warn!(path = %self.path.display(), "Datasource registry is malformed, starting empty");
        }

        let mut loaded = 0usize;
        for row in dump::rows_of(tables, DATASOURCE_TABLE) {
            match datasource_from_row(&row) {
                Some(datasource) => {
                    self.add(datasource);
                    loaded = loaded.saturating_add(1);
                }
                None => tracing::warn!("Skipping datasource row without a name"),
            }
        }
        tracing::info!(datasources = loaded, "Loaded datasource registry");
        Ok(())
    }

    /// Every profile in insertion order.
    pub fn list(&self) -> &[Datasource] {
        &self.datasources
    }

    /// Looks up a profile by exact name.
    pub fn by_name(&self, name: &str) -> Option<&Datasource> {
        self.datasources.iter().find(|d| d.name == name)
    }

    /// Mutable lookup by exact name.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Datasource> {
        self.datasources.iter_mut().find(|d| d.name == name)
    }

    /// Adds or replaces a profile and returns its id.
    ///
    /// A profile with the same name is overwritten in place, keeping its id
    /// and position. Otherwise the next id is assigned and the profile is
    /// appended.
    pub fn add(&mut self, mut datasource: Datasource) -> i64 {
        if let Some(existing) = self
            .datasources
            .iter_mut()
            .find(|d| d.name == datasource.name)
        {
            datasource.id = existing.id;
            *existing = datasource;
            tracing::debug!(id = existing.id, name = %existing.name, "Replaced datasource");
            return existing.id;
        }

        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        datasource.id = id;
        tracing::debug!(id, name = %datasource.name, "Added datasource");
        self.datasources.push(datasource);
        id
    }

    /// Removes the named profile, returning it.
    pub fn remove_by_name(&mut self, name: &str) -> Option<Datasource> {
        let position = self.datasources.iter().position(|d| d.name == name)?;
        let removed = self.datasources.remove(position);
        tracing::debug!(id = removed.id, name, "Removed datasource");
        Some(removed)
    }

    /// Writes every profile to the registry file with empty passwords.
    ///
    /// # Errors
    /// Returns a persistence error when the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let rows: Vec<Row> = self.datasources.iter().map(datasource_row).collect();
        let document = dump::encode_table(DATASOURCE_TABLE, &rows, EscapePolicy::Uniform);
        persist::write_atomic(&self.path, &document, "datasource registry")?;
        tracing::info!(
            datasources = self.datasources.len(),
            path = %self.path.display(),
            "Saved datasource registry"
        );
        Ok(())
    }

    /// Location of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.datasources.len()
    }

    /// True when no profiles exist.
    pub fn is_empty(&self) -> bool {
        self.datasources.is_empty()
    }
}

fn datasource_from_row(row: &Row) -> Option<Datasource> {
    let name = row.optional("name")?;
    let datasource_type_id = row
        .int("datasource_type_id")
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or_default();
    let port = row
        .int("port")
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or_default();

    let mut datasource = Datasource::new(name, datasource_type_id, row.string("host"), port);
    datasource.description = row.string("description");
    datasource.service_name = row.string("service_name");
    // Passwords are never read back, even from hand-edited files.
    datasource.credentials = Credentials::new(row.string("user_name"), None);
    datasource.password_stored = row.flag("password_stored");
    datasource.db_name = row.string("db_name");
    datasource.last_connect = row.optional("last_connect");
    datasource.timestamp = row.optional("timestamp");
    datasource.application_id = row.int_or("application_id", 0);
    datasource.shared = row.flag("shared");
    datasource.connection_properties = row.string("con_property");
    datasource.os_username = row.string("os_username");
    datasource.db_home_dir = row.string("db_home_dir");
    datasource.custom_url = row.optional("custom_url");
    datasource.severity = row
        .int("severity")
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(DEFAULT_DATASOURCE_SEVERITY);
    datasource.db_driver_id = row.int("db_driver_id");
    datasource.compatibility_mode = row.string("compatibility_mode");
    Some(datasource)
}

fn datasource_row(datasource: &Datasource) -> Row {
    let flag = |set: bool| if set { "1" } else { "0" };
    Row::new()
        .with("DATASOURCE_ID", datasource.id.to_string())
        .with(
            "DATASOURCE_TYPE_ID",
            datasource.datasource_type_id.to_string(),
        )
        .with("NAME", datasource.name.as_str())
        .with("DESCRIPTION", datasource.description.as_str())
        .with("HOST", datasource.host.as_str())
        .with("PORT", datasource.port.to_string())
        .with("SERVICE_NAME", datasource.service_name.as_str())
        .with("USER_NAME", datasource.credentials.username())
        .with("PASSWORD", "")
        .with("PASSWORD_STORED", flag(datasource.password_stored))
        .with("DB_NAME", datasource.db_name.as_str())
        .with(
            "LAST_CONNECT",
            datasource.last_connect.clone().unwrap_or_default(),
        )
        .with("TIMESTAMP", datasource.timestamp.clone().unwrap_or_default())
        .with("APPLICATION_ID", datasource.application_id.to_string())
        .with("SHARED", flag(datasource.shared))
        .with(
            "CON_PROPERTY",
            strip_database_credentials(&datasource.connection_properties),
        )
        .with("OS_USERNAME", datasource.os_username.as_str())
        .with("DB_HOME_DIR", datasource.db_home_dir.as_str())
        .with(
            "CUSTOM_URL",
            datasource
                .custom_url
                .as_deref()
                .map(strip_database_credentials)
                .unwrap_or_default(),
        )
        .with("SEVERITY", datasource.severity.to_string())
        .with(
            "DB_DRIVER_ID",
            datasource
                .db_driver_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        )
        .with("COMPATIBILITY_MODE", datasource.compatibility_mode.as_str())
}
