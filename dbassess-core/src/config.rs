//! Filesystem layout and executor settings.
//!
//! [`StoreConfig`] says where the encrypted catalog resources live and which
//! working directory receives the datasource registry, the driver store and
//! the short-lived decrypted catalog files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::DbAssessError;

/// Registry file name inside the working directory.
pub const DATASOURCE_FILE: &str = "datasource.dump";
/// Driver store file name inside the working directory.
pub const DRIVER_FILE: &str = "dbdriver.dump";

/// Default working directory for the current platform.
pub fn default_work_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"c:\temp\vatest")
    } else {
        PathBuf::from("/var/tmp/vatest")
    }
}

/// Locations used by the catalog, driver store and datasource registry.
///
/// # Example
/// ```rust
/// use dbassess_core::config::StoreConfig;
///
/// let config = StoreConfig::new("/opt/dbassess/resources")
///     .with_work_dir("/tmp/dbassess");
///
/// assert!(config.validate().is_ok());
/// assert!(config.datasource_path().ends_with("datasource.dump"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the encrypted catalog resources
    pub resource_dir: PathBuf,
    /// Directory for persisted registries and transient decrypted files
    pub work_dir: PathBuf,
    /// File name of the datasource registry
    pub datasource_file: String,
    /// File name of the persisted driver store
    pub driver_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("resources"),
            work_dir: default_work_dir(),
            datasource_file: DATASOURCE_FILE.to_string(),
            driver_file: DRIVER_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Creates a config reading resources from `resource_dir`.
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the working directory.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Builder method to set the resource directory.
    pub fn with_resource_dir(mut self, resource_dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = resource_dir.into();
        self
    }

    /// Builder method to set the registry file name.
    pub fn with_datasource_file(mut self, name: impl Into<String>) -> Self {
        self.datasource_file = name.into();
        self
    }

    /// Builder method to set the driver store file name.
    pub fn with_driver_file(mut self, name: impl Into<String>) -> Self {
        self.driver_file = name.into();
        self
    }

    /// Full path of the datasource registry file.
    pub fn datasource_path(&self) -> PathBuf {
        self.work_dir.join(&self.datasource_file)
    }

    /// Full path of the persisted driver store.
    pub fn driver_path(&self) -> PathBuf {
        self.work_dir.join(&self.driver_file)
    }

    /// Working directory accessor.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if a directory is empty or a file name contains a path
    /// separator.
    pub fn validate(&self) -> crate::Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(DbAssessError::configuration("work_dir cannot be empty"));
        }

        if self.resource_dir.as_os_str().is_empty() {
            return Err(DbAssessError::configuration(
                "resource_dir cannot be empty",
            ));
        }

        for (field, name) in [
            ("datasource_file", &self.datasource_file),
            ("driver_file", &self.driver_file),
        ] {
            if name.is_empty() {
                return Err(DbAssessError::configuration(format!(
                    "{} cannot be empty",
                    field
                )));
            }
            if name.contains('/') || name.contains('\\') {
                return Err(DbAssessError::configuration(format!(
                    "{} must be a bare file name",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Creates the working directory if it does not exist yet.
    pub fn ensure_work_dir(&self) -> crate::Result<()> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| {
            DbAssessError::io(
                format!("creating working directory {}", self.work_dir.display()),
                e,
            )
        })
    }
}

/// Settings for [`crate::assessment::AssessmentExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Record a failing or panicking check as an ERROR outcome instead of
    /// leaving it out of the results
    pub record_check_errors: bool,
    /// Ask the target for its product version after connecting
    pub probe_version: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            record_check_errors: true,
            probe_version: true,
        }
    }
}

impl ExecutorConfig {
    /// Builder method to toggle ERROR recording for faulting checks.
    pub fn with_record_check_errors(mut self, record: bool) -> Self {
        self.record_check_errors = record;
        self
    }

    /// Builder method to toggle the version probe.
    pub fn with_probe_version(mut self, probe: bool) -> Self {
        self.probe_version = probe;
        self
    }
}
