//! Assessment execution against a live target.
//!
//! The executor never evaluates checks itself: it opens a connection through
//! a [`TargetConnector`] and hands each scheduled test to the resulting
//! [`TargetConnection`].
//!
//! # Run sequence
//! 1. resolve the driver and datasource type
//! 2. connect; a failure aborts the run with nothing recorded
//! 3. probe the product version; a failure is logged and ignored
//! 4. execute every test in order, checking for cancellation before and
//!    after each one
//!
//! A check that errors or panics is recorded as an `ERROR` result and the
//! run continues.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AssessmentError;
use crate::catalog::{Catalog, DriverStore};
use crate::config::ExecutorConfig;
use crate::models::{
    AssessmentTest, CheckOutcome, Datasource, DatasourceType, DbDriver, Outcome,
    SecurityAssessment, TestResult,
};
use crate::results::{AssessmentReport, RankingPolicy, ResultAggregator};

/// Cooperative cancellation shared between a run and its controller.
///
/// Observed only between steps; a check already running is not
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Target product version reported by the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVersion {
    pub version: String,
    pub patch_level: Option<String>,
}

/// A datasource with its driver and type metadata resolved.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub datasource: Datasource,
    pub datasource_type: &'static DatasourceType,
    /// The pinned driver, else the first driver for the type
    pub driver: Option<DbDriver>,
}

/// Opens connections to assessment targets.
///
/// # Security
/// Implementations must keep credentials out of error messages.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Opens a connection to `target`.
    ///
    /// # Errors
    /// Any error aborts the run.
    async fn connect(&self, target: &ResolvedTarget) -> crate::Result<Box<dyn TargetConnection>>;
}

/// An open connection able to evaluate checks.
#[async_trait]
pub trait TargetConnection: Send {
    /// Queries the product version and patch level.
    async fn product_version(&mut self) -> crate::Result<ProductVersion>;

    /// Evaluates one scheduled test.
    async fn execute(&mut self, test: &AssessmentTest) -> crate::Result<CheckOutcome>;
}

/// Outcome of one run: its results and how it ended.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Unique per run, for correlating log lines
    pub run_id: Uuid,
    pub assessment_id: i64,
    pub datasource_name: String,
    pub product_version: Option<ProductVersion>,
    /// Results in execution order
    pub results: ResultAggregator,
    /// Set when the run stopped early; unexecuted tests have no result
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Finalizes the results into a report.
    pub fn into_report(self, policy: &RankingPolicy) -> AssessmentReport {
        self.results.into_report(policy)
    }
}

/// Runs assessments against live targets.
pub struct AssessmentExecutor<'a> {
    catalog: &'a Catalog,
    drivers: &'a DriverStore,
    connector: &'a dyn TargetConnector,
    config: ExecutorConfig,
}

impl std::fmt::Debug for AssessmentExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentExecutor")
            .field("drivers", &self.drivers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> AssessmentExecutor<'a> {
    /// Creates an executor.
    pub fn new(
        catalog: &'a Catalog,
        drivers: &'a DriverStore,
        connector: &'a dyn TargetConnector,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            catalog,
            drivers,
            connector,
            config,
        }
    }

    /// Runs `assessment` against `datasource`.
    ///
    /// # Errors
    /// Returns [`AssessmentError::UnknownDatasourceType`] or
    /// [`AssessmentError::Connection`] before any test runs. Once connected
    /// the run always completes with a report.
    pub async fn run(
        &self,
        assessment: &SecurityAssessment,
        datasource: &Datasource,
        cancel: &CancellationFlag,
    ) -> Result<RunReport, AssessmentError> {
        let started_at = Utc::now();
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            assessment_id: assessment.id,
            datasource_name: datasource.name.clone(),
            product_version: None,
            results: ResultAggregator::new(),
            cancelled: false,
            started_at,
            finished_at: started_at,
        };

        if cancel.is_cancelled() {
            tracing::info!(assessment_id = assessment.id, "Run cancelled before connecting");
            report.cancelled = true;
            return Ok(report);
        }

        let mut target = self.resolve(datasource)?;

        tracing::info!(
            run_id = %report.run_id,
            assessment_id = assessment.id,
            datasource = %target.datasource,
            tests = assessment.len(),
            "Starting assessment run"
        );

        let mut connection = self.connector.connect(&target).await.map_err(|e| {
            tracing::error!(datasource = %datasource.name, error = %e, "Connection failed, run aborted");
            AssessmentError::Connection {
                datasource: datasource.name.clone(),
                source: Box::new(e),
            }
        })?;

        if self.config.probe_version {
            match connection.product_version().await {
                Ok(version) => {
                    tracing::debug!(version = %version.version, "Probed target version");
                    target.datasource.version_level = Some(version.version.clone());
                    target.datasource.patch_level = version.patch_level.clone();
                    report.product_version = Some(version);
                }
                Err(e) => {
                    tracing::warn!(datasource = %datasource.name, error = %e, "Version probe failed, continuing");
                }
            }
        }

        for test in &assessment.tests {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if let Some(result) = self.execute_one(connection.as_mut(), test, &target).await {
                report.results.record(result);
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }

        report.finished_at = Utc::now();
        tracing::info!(
            run_id = %report.run_id,
            recorded = report.results.len(),
            cancelled = report.cancelled,
            "Assessment run finished"
        );
        Ok(report)
    }

    fn resolve(&self, datasource: &Datasource) -> Result<ResolvedTarget, AssessmentError> {
        let datasource_type =
            datasource
                .datasource_type()
                .ok_or_else(|| AssessmentError::UnknownDatasourceType {
                    datasource: datasource.name.clone(),
                    type_id: datasource.datasource_type_id,
                })?;

        let driver = datasource
            .db_driver_id
            .and_then(|id| self.drivers.by_id(id))
            .or_else(|| self.drivers.first_for_type(datasource.datasource_type_id))
            .cloned();
        if driver.is_none() {
            tracing::warn!(
                datasource = %datasource.name,
                datasource_type = datasource_type.name,
                "No driver metadata for datasource type"
            );
        }

        Ok(ResolvedTarget {
            datasource: datasource.clone(),
            datasource_type,
            driver,
        })
    }

    async fn execute_one(
        &self,
        connection: &mut dyn TargetConnection,
        test: &AssessmentTest,
        target: &ResolvedTarget,
    ) -> Option<TestResult> {
        let test_id = test.test_id();
        tracing::debug!(test_id, "Executing test");

        let outcome = AssertUnwindSafe(connection.execute(test)).catch_unwind().await;
        let check = match outcome {
            Ok(Ok(check)) => check,
            Ok(Err(e)) => {
                tracing::warn!(test_id, error = %e, "Test failed to execute");
                if !self.config.record_check_errors {
                    return None;
                }
                CheckOutcome::new(Outcome::Error, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(test_id, panic = %message, "Test panicked");
                if !self.config.record_check_errors {
                    return None;
                }
                CheckOutcome::new(Outcome::Error, format!("Test aborted: {}", message))
            }
        };

        let result = TestResult::record(test, &target.datasource, check);
        let group = test
            .exception_group_id
            .and_then(|id| self.catalog.groups().group(id));
        Some(match group {
            Some(group) => result.with_exception_group(group.description.as_str()),
            None => result,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryResources;
    use crate::models::{AvailableTest, Severity};
    use std::sync::Mutex;

    /// Scripted connection: per test id, pass, fail, error or panic.
    struct Scripted {
        executed: Arc<Mutex<Vec<i64>>>,
        cancel_after: Option<(usize, CancellationFlag)>,
        version: Option<&'static str>,
    }

    #[async_trait]
    impl TargetConnection for Scripted {
        async fn product_version(&mut self) -> crate::Result<ProductVersion> {
            match self.version {
                Some(v) => Ok(ProductVersion {
                    version: v.to_string(),
                    patch_level: Some("SP2".to_string()),
                }),
                None => Err(crate::DbAssessError::query_execution("version view missing")),
            }
        }

        async fn execute(&mut self, test: &AssessmentTest) -> crate::Result<CheckOutcome> {
            let count = {
                let mut executed = self.executed.lock().unwrap();
                executed.push(test.test_id());
                executed.len()
            };
            if let Some((k, flag)) = &self.cancel_after {
                if count == *k {
                    flag.cancel();
                }
            }
            match test.test_id() % 4 {
                0 => Ok(CheckOutcome::new(Outcome::Pass, "ok")),
                1 => Ok(CheckOutcome::new(Outcome::Fail, "bad")),
                2 => Err(crate::DbAssessError::query_execution("table missing")),
                _ => panic!("check {} exploded", test.test_id()),
            }
        }
    }

    struct Connector {
        fail: bool,
        executed: Arc<Mutex<Vec<i64>>>,
        cancel_after: Option<(usize, CancellationFlag)>,
        version: Option<&'static str>,
        connects: Arc<Mutex<usize>>,
    }

    impl Connector {
        fn new() -> Self {
            Self {
                fail: false,
                executed: Arc::new(Mutex::new(Vec::new())),
                cancel_after: None,
                version: Some("15.0.4123"),
                connects: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl TargetConnector for Connector {
        async fn connect(
            &self,
            _target: &ResolvedTarget,
        ) -> crate::Result<Box<dyn TargetConnection>> {
            *self.connects.lock().unwrap() += 1;
            if self.fail {
                return Err(crate::DbAssessError::connection(
                    "login timeout",
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
                ));
            }
            Ok(Box::new(Scripted {
                executed: Arc::clone(&self.executed),
                cancel_after: self.cancel_after.clone(),
                version: self.version,
            }))
        }
    }

    fn assessment(ids: &[i64]) -> SecurityAssessment {
        SecurityAssessment {
            id: 7,
            description: "test".to_string(),
            datasource_names: vec!["mssql-prod".to_string()],
            tests: ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    AssessmentTest::new(i as i64 + 1, 7, AvailableTest::new(*id, 4, Severity::Major))
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn fixtures(dir: &std::path::Path) -> (Catalog, DriverStore) {
        let catalog = Catalog::new(MemoryResources::new(), dir);
        let drivers = DriverStore::from_drivers(
            vec![DbDriver {
                id: 3,
                datasource_type_id: 4,
                name: "SQL Server".to_string(),
                ..Default::default()
            }],
            dir.join("dbdriver.dump"),
        );
        (catalog, drivers)
    }

    #[tokio::test]
    async fn test_run_records_every_test_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let connector = Connector::new();
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
        let report = executor
            .run(&assessment(&[2000, 2001, 2002, 2003, 2004]), &ds, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(!report.cancelled);
        let outcomes: Vec<Outcome> = report.results.results().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![Outcome::Pass, Outcome::Fail, Outcome::Error, Outcome::Error, Outcome::Pass]
        );
        let results = report.results.results();
        assert!(results[2].result_text.contains("table missing"));
        assert!(results[3].result_text.contains("exploded"));
        assert_eq!(results[0].datasource_version.as_deref(), Some("15.0.4123"));
        assert_eq!(
            report.product_version.and_then(|v| v.patch_level).as_deref(),
            Some("SP2")
        );
    }

    #[tokio::test]
    async fn test_errors_can_be_left_unrecorded() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let connector = Connector::new();
        let config = ExecutorConfig::default().with_record_check_errors(false);
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, config);

        let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
        let report = executor
            .run(&assessment(&[2000, 2002, 2003, 2001]), &ds, &CancellationFlag::new())
            .await
            .unwrap();
        let ids: Vec<i64> = report.results.results().iter().map(|r| r.test_id).collect();
        assert_eq!(ids, vec![2000, 2001]);
    }

    #[tokio::test]
    async fn test_connection_failure_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let mut connector = Connector::new();
        connector.fail = true;
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
        let err = executor
            .run(&assessment(&[2000]), &ds, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::Connection { .. }));
        assert!(connector.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_probe_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let mut connector = Connector::new();
        connector.version = None;
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
        let report = executor
            .run(&assessment(&[2000, 2001]), &ds, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(report.results.len(), 2);
        assert!(report.product_version.is_none());
        assert_eq!(report.results.results()[0].datasource_version, None);
    }

    #[tokio::test]
    async fn test_cancel_before_connect() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let connector = Connector::new();
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
        let report = executor.run(&assessment(&[2000]), &ds, &cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(*connector.connects.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_k_tests() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        for k in 1..=4 {
            let cancel = CancellationFlag::new();
            let mut connector = Connector::new();
            connector.cancel_after = Some((k, cancel.clone()));
            let executor =
                AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

            let ds = Datasource::new("mssql-prod", 4, "sql1", 0);
            let report = executor
                .run(&assessment(&[2000, 2001, 2004, 2005, 2008, 2009]), &ds, &cancel)
                .await
                .unwrap();
            assert!(report.cancelled);
            assert!(report.results.len() <= k);
            assert_eq!(connector.executed.lock().unwrap().len(), k);
        }
    }

    #[tokio::test]
    async fn test_unknown_type_aborts_before_connect() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, drivers) = fixtures(dir.path());
        let connector = Connector::new();
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let ds = Datasource::new("mystery", 999, "h", 1);
        let err = executor
            .run(&assessment(&[2000]), &ds, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::UnknownDatasourceType { type_id: 999, .. }));
        assert_eq!(*connector.connects.lock().unwrap(), 0);
    }

    #[test]
    fn test_resolve_prefers_pinned_driver() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(MemoryResources::new(), dir.path());
        let drivers = DriverStore::from_drivers(
            vec![
                DbDriver {
                    id: 1,
                    datasource_type_id: 4,
                    ..Default::default()
                },
                DbDriver {
                    id: 2,
                    datasource_type_id: 4,
                    ..Default::default()
                },
            ],
            dir.path().join("dbdriver.dump"),
        );
        let connector = Connector::new();
        let executor = AssessmentExecutor::new(&catalog, &drivers, &connector, ExecutorConfig::default());

        let default = executor.resolve(&Datasource::new("a", 4, "h", 0)).unwrap();
        assert_eq!(default.driver.map(|d| d.id), Some(1));
        assert_eq!(default.datasource_type.name, "MS SQL SERVER");

        let pinned = executor
            .resolve(&Datasource::new("a", 4, "h", 0).with_driver(2))
            .unwrap();
        assert_eq!(pinned.driver.map(|d| d.id), Some(2));
    }
}
