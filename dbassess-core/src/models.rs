//! Core data models for catalogs, datasources, assessments and results.
//!
//! Catalog records ([`AvailableTest`], [`SqlbasedAssessmentDefinition`],
//! [`CveFix`], [`CveReference`], the exception-group records and
//! [`DbDriver`]) are immutable once loaded. [`Datasource`] is the
//! user-editable connection profile. [`SecurityAssessment`] and
//! [`AssessmentTest`] describe one run, and [`TestResult`] is its recorded
//! output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::redact_database_url;
use crate::security::Credentials;

/// A supported target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DatasourceType {
    pub id: i32,
    pub name: &'static str,
    /// Port filled in when a profile does not name one
    pub default_port: u16,
}

/// Every datasource type the catalogs reference, by id.
pub const DATASOURCE_TYPES: [DatasourceType; 22] = [
    DatasourceType { id: 1, name: "ORACLE", default_port: 1521 },
    DatasourceType { id: 2, name: "DB2", default_port: 50000 },
    DatasourceType { id: 3, name: "SYBASE", default_port: 4100 },
    DatasourceType { id: 4, name: "MS SQL SERVER", default_port: 1433 },
    DatasourceType { id: 5, name: "INFORMIX", default_port: 1526 },
    DatasourceType { id: 6, name: "MYSQL", default_port: 3306 },
    DatasourceType { id: 7, name: "TEXT", default_port: 0 },
    DatasourceType { id: 8, name: "TEXT:HTTP", default_port: 8000 },
    DatasourceType { id: 9, name: "TEXT:FTP", default_port: 21 },
    DatasourceType { id: 10, name: "TEXT:SAMBA", default_port: 445 },
    DatasourceType { id: 11, name: "TEXT:HTTPS", default_port: 8443 },
    DatasourceType { id: 12, name: "TERADATA", default_port: 1025 },
    DatasourceType { id: 13, name: "N_A", default_port: 0 },
    DatasourceType { id: 14, name: "IBM ISERIES", default_port: 446 },
    DatasourceType { id: 15, name: "POSTGRESQL", default_port: 5432 },
    DatasourceType { id: 16, name: "NETEZZA", default_port: 5480 },
    DatasourceType { id: 17, name: "DB2 z/OS", default_port: 446 },
    DatasourceType { id: 18, name: "SYBASE IQ", default_port: 2638 },
    DatasourceType { id: 19, name: "GREENPLUM", default_port: 5432 },
    DatasourceType { id: 20, name: "ASTER", default_port: 2406 },
    DatasourceType { id: 21, name: "MONGODB", default_port: 27017 },
    DatasourceType { id: 22, name: "SAP HANA", default_port: 30015 },
];

impl DatasourceType {
    /// Looks up a type by id.
    pub fn by_id(id: i32) -> Option<&'static Self> {
        DATASOURCE_TYPES.iter().find(|t| t.id == id)
    }

    /// Looks up a type by name, ignoring case.
    pub fn by_name(name: &str) -> Option<&'static Self> {
        DATASOURCE_TYPES
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for DatasourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// How a catalog test is evaluated.
///
/// Assigned once when the catalog loads, from the test id: CVE checks
/// occupy `[1000, 2000)` and query-based checks `[2000, 3000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Runs SQL against the target and compares the answer
    QueryBased,
    /// Compares the target version and patch level with known fixes
    Cve,
    /// Anything outside the two id ranges
    Other,
}

impl TestKind {
    /// Test ids reserved for CVE checks.
    pub const CVE_IDS: Range<i64> = 1000..2000;
    /// Test ids reserved for query-based checks.
    pub const QUERY_IDS: Range<i64> = 2000..3000;

    /// Classifies a catalog test id.
    pub fn from_test_id(id: i64) -> Self {
        if Self::QUERY_IDS.contains(&id) {
            Self::QueryBased
        } else if Self::CVE_IDS.contains(&id) {
            Self::Cve
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::QueryBased => write!(f, "Query"),
            TestKind::Cve => write!(f, "CVE"),
            TestKind::Other => write!(f, "Other"),
        }
    }
}

/// Which tests a selection or summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Every test, including ids outside both ranges
    #[default]
    All,
    QueryOnly,
    CveOnly,
}

impl Scope {
    /// True when a test of `kind` falls inside this scope.
    pub fn includes(self, kind: TestKind) -> bool {
        match self {
            Scope::All => true,
            Scope::QueryOnly => kind == TestKind::QueryBased,
            Scope::CveOnly => kind == TestKind::Cve,
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Scope::All),
            "query" | "query_only" | "query-only" => Ok(Scope::QueryOnly),
            "cve" | "cve_only" | "cve-only" => Ok(Scope::CveOnly),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// Catalog severity of a check.
///
/// Anything other than the five ranked levels is kept verbatim as
/// [`Severity::Unrecognized`]; such results are left out of the ranked
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Caution,
    #[default]
    Info,
    Unrecognized(String),
}

impl Severity {
    /// Ranked levels, most severe first.
    pub const RANKED: [Severity; 5] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Caution,
        Severity::Info,
    ];

    /// Parses a catalog value, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "MAJOR" => Severity::Major,
            "MINOR" => Severity::Minor,
            "CAUTION" => Severity::Caution,
            "INFO" => Severity::Info,
            _ => Severity::Unrecognized(value.to_string()),
        }
    }

    /// Position in the ranking, 0 for CRITICAL. `None` when unrecognized.
    pub fn rank(&self) -> Option<usize> {
        match self {
            Severity::Critical => Some(0),
            Severity::Major => Some(1),
            Severity::Minor => Some(2),
            Severity::Caution => Some(3),
            Severity::Info => Some(4),
            Severity::Unrecognized(_) => None,
        }
    }

    /// Catalog spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Caution => "CAUTION",
            Severity::Info => "INFO",
            Severity::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Severity::parse(&value)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one executed check.
///
/// Sixteen kinds: pass, fail and fourteen conditions under which the check
/// could not be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
    NoCasData,
    NoReportData,
    UnsupportedDbVersion,
    UnsupportedOsVersion,
    SpecialError,
    CasDataCollectionError,
    ObsoleteParameter,
    DeprecatedParameter,
    CveNotReported,
    NoUserData,
    ModulesNotPresent,
    PreTestCheckFailed,
    ExecutionTestRoutineCheckFailed,
}

impl Outcome {
    /// Every outcome kind, in report order.
    pub const ALL: [Outcome; 16] = [
        Outcome::Pass,
        Outcome::Fail,
        Outcome::Error,
        Outcome::NoCasData,
        Outcome::NoReportData,
        Outcome::UnsupportedDbVersion,
        Outcome::UnsupportedOsVersion,
        Outcome::SpecialError,
        Outcome::CasDataCollectionError,
        Outcome::ObsoleteParameter,
        Outcome::DeprecatedParameter,
        Outcome::CveNotReported,
        Outcome::NoUserData,
        Outcome::ModulesNotPresent,
        Outcome::PreTestCheckFailed,
        Outcome::ExecutionTestRoutineCheckFailed,
    ];

    /// Numeric score code used by stored results.
    pub fn code(self) -> i32 {
        match self {
            Outcome::Pass => 1,
            Outcome::Fail => 0,
            Outcome::Error => -1,
            Outcome::NoCasData => -2,
            Outcome::NoReportData => -3,
            Outcome::UnsupportedDbVersion => -4,
            Outcome::UnsupportedOsVersion => -5,
            Outcome::SpecialError => -6,
            Outcome::CasDataCollectionError => -7,
            Outcome::ObsoleteParameter => -8,
            Outcome::DeprecatedParameter => -9,
            Outcome::CveNotReported => -10,
            Outcome::NoUserData => -11,
            Outcome::ModulesNotPresent => -12,
            Outcome::PreTestCheckFailed => -13,
            Outcome::ExecutionTestRoutineCheckFailed => -14,
        }
    }

    /// Inverse of [`Outcome::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.code() == code)
    }

    /// Position in [`Outcome::ALL`].
    pub fn index(self) -> usize {
        match self {
            Outcome::Pass => 0,
            Outcome::Fail => 1,
            Outcome::Error => 2,
            Outcome::NoCasData => 3,
            Outcome::NoReportData => 4,
            Outcome::UnsupportedDbVersion => 5,
            Outcome::UnsupportedOsVersion => 6,
            Outcome::SpecialError => 7,
            Outcome::CasDataCollectionError => 8,
            Outcome::ObsoleteParameter => 9,
            Outcome::DeprecatedParameter => 10,
            Outcome::CveNotReported => 11,
            Outcome::NoUserData => 12,
            Outcome::ModulesNotPresent => 13,
            Outcome::PreTestCheckFailed => 14,
            Outcome::ExecutionTestRoutineCheckFailed => 15,
        }
    }

    /// Display label.
    pub fn description(self) -> &'static str {
        match self {
            Outcome::Pass => "Pass",
            Outcome::Fail => "Fail",
            Outcome::Error => "Error",
            Outcome::NoCasData => "No CAS Data",
            Outcome::NoReportData => "No Report Data",
            Outcome::UnsupportedDbVersion => "Unsupported Database",
            Outcome::UnsupportedOsVersion => "Unsupported Operating System",
            Outcome::SpecialError => "Special Error",
            Outcome::CasDataCollectionError => "CAS Data Collection Error",
            Outcome::ObsoleteParameter => "Obsolete Parameter",
            Outcome::DeprecatedParameter => "Deprecated Parameter",
            Outcome::CveNotReported => "Not/Applicable for the DB version",
            Outcome::NoUserData => "No User or Group data",
            Outcome::ModulesNotPresent => "Modules listed for PTF not present in DB2 MEPL",
            Outcome::PreTestCheckFailed => "Pre Test Check Failed. Test not executed",
            Outcome::ExecutionTestRoutineCheckFailed => {
                "CalculateScore routine not defined. Test not executed"
            }
        }
    }

    /// Recommendation used when a check reports this outcome without one.
    pub fn default_recommendation(self) -> Option<&'static str> {
        match self {
            Outcome::Pass | Outcome::Fail | Outcome::ModulesNotPresent => None,
            Outcome::Error => Some("Please correct the error condition and run the Assessment again."),
            Outcome::NoCasData => Some(
                "No CAS results were available for this test. Please make sure that all required Monitored Items are enabled and the CAS process has had time to collect data prior to running the Assessment.",
            ),
            Outcome::NoReportData => Some(
                "Report data was not available to evaluate this test. Please make sure that the reports have run prior to running the Assessment.",
            ),
            Outcome::UnsupportedDbVersion => Some(
                "This test is not valid for this version of the database. No action is required.",
            ),
            Outcome::UnsupportedOsVersion => Some(
                "This test is not valid for this version of the Operating System. No action is required.",
            ),
            Outcome::SpecialError => {
                Some("A special error occurred. Please check the result text for guidelines.")
            }
            Outcome::CasDataCollectionError => Some(
                "Possibly CAS needs permission to run data collection program, or cannot locate the program.",
            ),
            Outcome::ObsoleteParameter => Some("Parameter is obsolete for this DB version"),
            Outcome::DeprecatedParameter => Some("Parameter is deprecated for this DB version"),
            Outcome::CveNotReported => {
                Some("This test is not applicable for this Database Version")
            }
            Outcome::NoUserData => Some(
                "Could not access either CKADBVA.CKA_OS_GROUP, CKADBVA.CKA_OS_USER or SYSIBM.SYSROLES.",
            ),
            Outcome::PreTestCheckFailed => Some("Pre Test Check Failed. Test not executed"),
            Outcome::ExecutionTestRoutineCheckFailed => Some(
                "CalculateScore routine not defined. Test not executed. Please make sure that this routine has been implemented.",
            ),
        }
    }

    /// True for PASS and FAIL.
    pub fn is_evaluated(self) -> bool {
        matches!(self, Outcome::Pass | Outcome::Fail)
    }

    /// Outcomes whose recommendation text is shown as-is in a report.
    /// Every other outcome displays its result text in its place.
    pub fn keeps_recommendation(self) -> bool {
        matches!(
            self,
            Outcome::Pass
                | Outcome::Fail
                | Outcome::UnsupportedDbVersion
                | Outcome::UnsupportedOsVersion
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Comparison applied between a query's answer and its compare-to value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    InGroup,
    IsNull,
    IsNotNull,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Like,
    Regexp,
    NotInGroup,
    InPeriod,
    NotInPeriod,
    NotLike,
    ClassifiedAs,
    CategorizedAs,
    LikeGroup,
    InDynamicGroup,
    NotInDynamicGroup,
    NotRegexp,
    InAliasesGroup,
    NotInAliasesGroup,
    InDynamicAliasesGroup,
    NotInDynamicAliasesGroup,
    NotLikeGroup,
}

impl ComparisonOperator {
    const TABLE: [(i32, ComparisonOperator, &'static str); 26] = [
        (1, Self::InGroup, "IN GROUP"),
        (2, Self::IsNull, "IS NULL"),
        (3, Self::IsNotNull, "IS NOT NULL"),
        (4, Self::Less, "<"),
        (5, Self::LessEqual, "<="),
        (6, Self::Greater, ">"),
        (7, Self::GreaterEqual, ">="),
        (8, Self::Equal, "="),
        (9, Self::NotEqual, "<>"),
        (10, Self::Like, "LIKE"),
        (11, Self::Regexp, "REGEXP"),
        (12, Self::NotInGroup, "NOT IN GROUP"),
        (13, Self::InPeriod, "IN PERIOD"),
        (14, Self::NotInPeriod, "NOT IN PERIOD"),
        (15, Self::NotLike, "NOT LIKE"),
        (16, Self::ClassifiedAs, "CLASSIFIED AS"),
        (17, Self::CategorizedAs, "CATEGORIZED AS"),
        (18, Self::LikeGroup, "LIKE GROUP"),
        (19, Self::InDynamicGroup, "IN DYNAMIC GROUP"),
        (20, Self::NotInDynamicGroup, "NOT IN DYNAMIC GROUP"),
        (21, Self::NotRegexp, "NOT REGEXP"),
        (22, Self::InAliasesGroup, "IN ALIASES GROUP"),
        (23, Self::NotInAliasesGroup, "NOT IN ALIASES GROUP"),
        (24, Self::InDynamicAliasesGroup, "IN DYNAMIC ALIASES GROUP"),
        (25, Self::NotInDynamicAliasesGroup, "NOT IN DYNAMIC ALIASES GROUP"),
        (26, Self::NotLikeGroup, "NOT LIKE GROUP"),
    ];

    /// Maps a stored operator id.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(code, _, _)| *code == id)
            .map(|(_, op, _)| *op)
    }

    /// Stored operator id.
    pub fn id(self) -> i32 {
        Self::TABLE
            .iter()
            .find(|(_, op, _)| *op == self)
            .map_or(0, |(code, _, _)| *code)
    }

    /// SQL-ish spelling for display.
    pub fn symbol(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, op, _)| *op == self)
            .map_or("", |(_, _, symbol)| *symbol)
    }

    /// True for the operators that compare against an exception group.
    pub fn uses_group(self) -> bool {
        matches!(
            self,
            Self::InGroup
                | Self::NotInGroup
                | Self::LikeGroup
                | Self::NotLikeGroup
                | Self::InDynamicGroup
                | Self::NotInDynamicGroup
                | Self::InAliasesGroup
                | Self::NotInAliasesGroup
                | Self::InDynamicAliasesGroup
                | Self::NotInDynamicAliasesGroup
        )
    }
}

/// Type a query's answer is compared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    String,
    Int,
    Date,
}

impl ReturnType {
    /// Parses the stored one-letter code (`S`, `I`, `D`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "S" => Some(ReturnType::String),
            "I" => Some(ReturnType::Int),
            "D" => Some(ReturnType::Date),
            _ => None,
        }
    }
}

/// Threshold a user may tune per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub required: bool,
    pub prompt: Option<String>,
    pub default_value: Option<String>,
}

/// DISA STIG cross-reference of a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StigReference {
    pub reference: Option<String>,
    pub severity: Option<String>,
    pub ia_controls: Option<String>,
    pub srg: Option<String>,
}

/// A check shipped in the test catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTest {
    pub id: i64,
    pub kind: TestKind,
    /// Raw catalog test type code (4 = query, 6 = CVE)
    pub test_type: i32,
    pub datasource_type_id: i32,
    pub severity: Severity,
    pub category_name: String,
    pub description: String,
    pub short_description: String,
    pub report_id: Option<i64>,
    pub class_name: String,
    pub audit_config_template_id: Option<i64>,
    pub threshold: Threshold,
    pub os: Option<String>,
    pub can_have_exceptions_group: bool,
    pub applicable_from_version: Option<String>,
    pub applicable_to_version: Option<String>,
    pub external_reference: Option<String>,
    pub stig: StigReference,
    pub timestamp: Option<String>,
}

impl AvailableTest {
    /// Creates a test with the given identity and defaults elsewhere.
    pub fn new(id: i64, datasource_type_id: i32, severity: Severity) -> Self {
        Self {
            id,
            kind: TestKind::from_test_id(id),
            test_type: 0,
            datasource_type_id,
            severity,
            category_name: String::new(),
            description: String::new(),
            short_description: String::new(),
            report_id: None,
            class_name: String::new(),
            audit_config_template_id: None,
            threshold: Threshold::default(),
            os: None,
            can_have_exceptions_group: false,
            applicable_from_version: None,
            applicable_to_version: None,
            external_reference: None,
            stig: StigReference::default(),
            timestamp: None,
        }
    }

    /// Builder method to set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_name = category.into();
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Body of a query-based check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlbasedAssessmentDefinition {
    pub id: i64,
    pub test_id: i64,
    pub sql_stmt: String,
    pub operator_id: i32,
    pub operator: Option<ComparisonOperator>,
    /// Threshold the answer is compared to
    pub compare_to_value: String,
    pub return_type: Option<ReturnType>,
    pub result_text_pass: String,
    pub result_text_fail: String,
    pub recommendation_text_pass: String,
    pub recommendation_text_fail: String,
    pub detail_sql: Option<String>,
    pub detail_text: Option<String>,
    pub pre_test_check_sql: Option<String>,
    pub pre_test_fail_message: Option<String>,
    pub is_callable_statement: bool,
    pub loop_databases: bool,
    pub db_loop_flag: bool,
}

/// Version and patch that remediate a CVE check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CveFix {
    pub id: i64,
    pub test_id: i64,
    pub version: String,
    pub patch: String,
    pub patch_to: String,
}

/// Advisory link for a CVE check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CveReference {
    pub id: i64,
    pub test_id: i64,
    pub reference_type: String,
    pub source: String,
    pub href: String,
}

/// A named exception group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDesc {
    pub id: i64,
    pub group_type_id: i64,
    pub description: String,
    pub application_id: Option<i64>,
    pub category_name: Option<String>,
    pub classification_name: Option<String>,
    pub subtype: Option<String>,
    pub content_type: Option<String>,
}

/// One entry of an exception group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: i64,
    pub member: String,
}

/// Kind of values an exception group holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupType {
    pub id: i64,
    pub description: String,
    /// Members are regular expressions rather than literals
    pub allow_regex: bool,
    pub tuple_flag: bool,
}

/// Driver metadata for one datasource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbDriver {
    pub id: i64,
    pub datasource_type_id: i32,
    pub name: String,
    pub class_name: String,
    pub url_template: String,
    pub base_url_template: String,
    /// Set once the user has supplied the driver library
    pub driver_stored: bool,
    pub timestamp: Option<String>,
}

/// Default severity weight of a new datasource profile.
pub const DEFAULT_DATASOURCE_SEVERITY: i32 = 2;

/// A user-configured connection profile.
///
/// # Security
/// The password lives only in [`Credentials`]; the registry never writes
/// it. `Display` omits credentials and masks passwords in custom URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasource {
    /// Assigned by the registry; 0 until then
    pub id: i64,
    pub datasource_type_id: i32,
    /// Unique key within the registry
    pub name: String,
    pub description: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub credentials: Credentials,
    pub password_stored: bool,
    pub db_name: String,
    pub last_connect: Option<String>,
    pub timestamp: Option<String>,
    pub application_id: i64,
    pub shared: bool,
    /// Free-form `key=value;key=value` driver properties
    pub connection_properties: String,
    pub os_username: String,
    pub db_home_dir: String,
    pub custom_url: Option<String>,
    pub severity: i32,
    pub db_driver_id: Option<i64>,
    pub compatibility_mode: String,
    /// Target product version, filled by the executor's probe
    pub version_level: Option<String>,
    /// Target patch level, filled by the executor's probe
    pub patch_level: Option<String>,
}

impl Datasource {
    /// Creates an unsaved profile. A zero port takes the type's default.
    pub fn new(
        name: impl Into<String>,
        datasource_type_id: i32,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        let port = if port == 0 {
            DatasourceType::by_id(datasource_type_id).map_or(0, |t| t.default_port)
        } else {
            port
        };
        Self {
            id: 0,
            datasource_type_id,
            name: name.into(),
            description: String::new(),
            host: host.into(),
            port,
            service_name: String::new(),
            credentials: Credentials::default(),
            password_stored: false,
            db_name: String::new(),
            last_connect: None,
            timestamp: None,
            application_id: 0,
            shared: false,
            connection_properties: String::new(),
            os_username: String::new(),
            db_home_dir: String::new(),
            custom_url: None,
            severity: DEFAULT_DATASOURCE_SEVERITY,
            db_driver_id: None,
            compatibility_mode: String::new(),
            version_level: None,
            patch_level: None,
        }
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the database or service name.
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    /// Builder method to pin a driver.
    pub fn with_driver(mut self, driver_id: i64) -> Self {
        self.db_driver_id = Some(driver_id);
        self
    }

    /// Builder method to set driver properties.
    pub fn with_connection_properties(mut self, properties: impl Into<String>) -> Self {
        self.connection_properties = properties.into();
        self
    }

    /// Type metadata, if the type id is known.
    pub fn datasource_type(&self) -> Option<&'static DatasourceType> {
        DatasourceType::by_id(self.datasource_type_id)
    }

    /// Type display name, `""` for unknown types.
    pub fn type_name(&self) -> &'static str {
        self.datasource_type().map_or("", |t| t.name)
    }

    /// Parses `connection_properties` into a map. Entries without `=` and
    /// blank keys are skipped; later keys win.
    pub fn connection_property_map(&self) -> BTreeMap<String, String> {
        self.connection_properties
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect()
    }
}

impl std::fmt::Display for Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.custom_url {
            Some(url) => write!(
                f,
                "{} [{}] {}",
                self.name,
                self.type_name(),
                redact_database_url(url)
            ),
            None => write!(
                f,
                "{} [{}] {}:{}{}",
                self.name,
                self.type_name(),
                self.host,
                self.port,
                if self.db_name.is_empty() {
                    String::new()
                } else {
                    format!("/{}", self.db_name)
                }
            ),
        }
        // Credentials are intentionally omitted
    }
}

/// One scheduled execution of a catalog test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentTest {
    pub assessment_test_id: i64,
    pub assessment_id: i64,
    pub test: AvailableTest,
    /// Present for query-based tests
    pub definition: Option<SqlbasedAssessmentDefinition>,
    /// Present for CVE tests
    pub cve_fixes: Vec<CveFix>,
    /// Defaults to the catalog severity
    pub severity: Severity,
    /// Overrides the catalog's default threshold when set
    pub threshold_value: Option<String>,
    /// Set when the user changed a run parameter
    pub modified: bool,
    pub exception_group_id: Option<i64>,
}

impl AssessmentTest {
    /// Schedules `test` with default run parameters.
    pub fn new(assessment_test_id: i64, assessment_id: i64, test: AvailableTest) -> Self {
        Self {
            assessment_test_id,
            assessment_id,
            severity: test.severity.clone(),
            test,
            definition: None,
            cve_fixes: Vec::new(),
            threshold_value: None,
            modified: false,
            exception_group_id: None,
        }
    }

    /// Catalog test id.
    pub fn test_id(&self) -> i64 {
        self.test.id
    }

    /// Kind of the scheduled test.
    pub fn kind(&self) -> TestKind {
        self.test.kind
    }

    /// Threshold in effect: the override, else the catalog default.
    pub fn effective_threshold(&self) -> Option<&str> {
        self.threshold_value
            .as_deref()
            .or(self.test.threshold.default_value.as_deref())
    }

    /// Overrides the threshold and marks the test modified.
    pub fn set_threshold(&mut self, value: impl Into<String>) {
        self.threshold_value = Some(value.into());
        self.modified = true;
    }

    /// Overrides the severity and marks the test modified.
    pub fn set_severity(&mut self, severity: Severity) {
        if severity != self.test.severity {
            self.modified = true;
        }
        self.severity = severity;
    }

    /// Attaches an exception group and marks the test modified.
    pub fn set_exception_group(&mut self, group_id: i64) {
        self.exception_group_id = Some(group_id);
        self.modified = true;
    }
}

/// One assessment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    pub id: i64,
    pub description: String,
    pub datasource_names: Vec<String>,
    /// Execution order
    pub tests: Vec<AssessmentTest>,
    pub created_at: DateTime<Utc>,
}

impl SecurityAssessment {
    /// Number of scheduled tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// True when nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Number of scheduled tests of `kind`.
    pub fn count_of(&self, kind: TestKind) -> usize {
        self.tests.iter().filter(|t| t.kind() == kind).count()
    }
}

/// What a check reports back to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub outcome: Outcome,
    pub result_text: String,
    pub detail: Option<String>,
    /// Overrides the recommendation the executor would derive
    pub recommendation: Option<String>,
}

impl CheckOutcome {
    /// Creates an outcome with result text.
    pub fn new(outcome: Outcome, result_text: impl Into<String>) -> Self {
        Self {
            outcome,
            result_text: result_text.into(),
            detail: None,
            recommendation: None,
        }
    }

    /// Builder method to attach detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Builder method to attach a recommendation.
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// Recorded outcome of one [`AssessmentTest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub assessment_test_id: i64,
    pub assessment_id: i64,
    pub test_id: i64,
    pub kind: TestKind,
    pub outcome: Outcome,
    pub outcome_description: String,
    pub result_text: String,
    pub recommendation_text: String,
    pub detail: Option<String>,
    pub test_description: String,
    pub short_description: String,
    pub category_name: String,
    pub severity: Severity,
    pub external_reference: Option<String>,
    pub stig: StigReference,
    /// "<prompt> used in this assessment: <value>" for tunable checks
    pub threshold_string: Option<String>,
    pub exception_group_description: Option<String>,
    pub parameter_modified: bool,
    pub datasource_name: String,
    pub datasource_description: String,
    pub datasource_type: String,
    pub datasource_version: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TestResult {
    /// Builds the result record for `test` from what the check reported.
    ///
    /// The recommendation is taken from the check, else from the SQL
    /// definition's pass/fail text, else from the outcome's default.
    pub fn record(test: &AssessmentTest, datasource: &Datasource, check: CheckOutcome) -> Self {
        let recommendation_text = check
            .recommendation
            .or_else(|| template_recommendation(test, check.outcome))
            .or_else(|| check.outcome.default_recommendation().map(str::to_string))
            .unwrap_or_default();

        let threshold_string = test.test.threshold.prompt.as_ref().map(|prompt| {
            format!(
                "{} used in this assessment: {}",
                prompt,
                test.effective_threshold().unwrap_or_default()
            )
        });

        Self {
            assessment_test_id: test.assessment_test_id,
            assessment_id: test.assessment_id,
            test_id: test.test_id(),
            kind: test.kind(),
            outcome: check.outcome,
            outcome_description: check.outcome.description().to_string(),
            result_text: check.result_text,
            recommendation_text,
            detail: check.detail,
            test_description: test.test.description.clone(),
            short_description: test.test.short_description.clone(),
            category_name: test.test.category_name.clone(),
            severity: test.severity.clone(),
            external_reference: test.test.external_reference.clone(),
            stig: test.test.stig.clone(),
            threshold_string,
            exception_group_description: None,
            parameter_modified: test.modified,
            datasource_name: datasource.name.clone(),
            datasource_description: datasource.description.clone(),
            datasource_type: datasource.type_name().to_string(),
            datasource_version: datasource.version_level.clone(),
            recorded_at: Utc::now(),
        }
    }

    /// Builder method to attach the exception group's description.
    pub fn with_exception_group(mut self, description: impl Into<String>) -> Self {
        self.exception_group_description = Some(description.into());
        self
    }
}

fn template_recommendation(test: &AssessmentTest, outcome: Outcome) -> Option<String> {
    let definition = test.definition.as_ref()?;
    let text = match outcome {
        Outcome::Pass => &definition.recommendation_text_pass,
        Outcome::Fail => &definition.recommendation_text_fail,
        _ => return None,
    };
    (!text.trim().is_empty()).then(|| text.clone())
}
