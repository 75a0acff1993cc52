//! Core engine for dbassess database security assessments.
//!
//! This crate loads the encrypted reference catalogs of predefined checks,
//! keeps the user's datasource profiles, assembles and executes assessments
//! against a live target, and classifies, ranks and summarizes the results.
//!
//! # Security Guarantees
//! - Datasource passwords are never persisted, logged or shown in errors
//! - Decrypted catalog files are owner-only and removed after parsing
//! - Key material and plaintext buffers are zeroed on drop
//! - Check bodies run only through caller-supplied capabilities
//!
//! # Architecture
//! - [`dump`] reads and writes the flat-file table format
//! - [`catalog`] builds each reference catalog once, on first use
//! - [`registry`] owns the editable datasource profiles
//! - [`assessment`] builds run-sets and executes them with cooperative
//!   cancellation and per-test fault isolation
//! - [`results`] orders and summarizes the outcomes of one run

pub mod assessment;
pub mod catalog;
pub mod config;
pub mod dump;
pub mod error;
pub mod logging;
pub mod models;
pub mod persist;
pub mod registry;
pub mod results;
pub mod security;

// Re-export commonly used types
pub use assessment::{
    AssessmentBuilder, AssessmentError, AssessmentExecutor, BuildError, CancellationFlag,
    ProductVersion, ResolvedTarget, RunReport, TargetConnection, TargetConnector, TestSelection,
};
pub use catalog::{Catalog, CatalogStats, DriverStore};
pub use config::{ExecutorConfig, StoreConfig};
pub use error::{DbAssessError, Result};
pub use logging::init_logging;
pub use models::{
    AssessmentTest, AvailableTest, CheckOutcome, Datasource, DatasourceType, Outcome, Scope,
    SecurityAssessment, Severity, TestKind, TestResult,
};
pub use registry::DatasourceRegistry;
pub use results::{AssessmentReport, RankingPolicy, ResultAggregator, Summary};
