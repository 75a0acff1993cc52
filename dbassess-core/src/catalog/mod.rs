//! Read-only reference catalogs.
//!
//! Each catalog kind ships as a sealed dump resource and is built on first
//! access:
//!
//! 1. read the resource by its fixed name from a [`ResourceSource`]
//! 2. unseal it with the [`BundleCipher`]
//! 3. write the plaintext to a private `<name>_new` file in the working
//!    directory, decode it, and delete the file
//! 4. index the rows
//!
//! A [`Catalog`] owns one `OnceLock` per kind, so concurrent first callers
//! observe a single build and the resource is read exactly once.
//!
//! A missing, undecryptable or malformed resource leaves that store empty
//! and is logged at `warn`. It never surfaces as an error: callers see
//! "not found" and empty lists.
//!
//! # Security Guarantees
//! - Decrypted catalog files are created with owner-only permissions
//! - Decrypted files are removed as soon as they are parsed, on every path
//! - Plaintext buffers are zeroed on drop

mod available;
mod definitions;
mod drivers;
mod groups;
mod references;
mod resources;
mod rows;

pub use available::TestStore;
pub use definitions::DefinitionStore;
pub use drivers::DriverStore;
pub use groups::GroupStore;
pub use references::{ByTestIndex, TestScoped};
pub use resources::{DirectoryResources, MemoryResources, ResourceSource, names};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::StoreConfig;
use crate::dump::{self, Row};
use crate::models::{CveFix, CveReference};
use crate::persist::WorkingFile;
use crate::results::RankingPolicy;
use crate::security::BundleCipher;

/// Lazily built reference data shared by the builder and executor.
///
/// # Example
/// ```rust,no_run
/// use dbassess_core::catalog::Catalog;
/// use dbassess_core::config::StoreConfig;
///
/// let catalog = Catalog::from_config(&StoreConfig::default());
/// for test in catalog.tests().for_datasource_type(4) {
///     println!("{} {}", test.id, test.description);
/// }
/// ```
pub struct Catalog {
    source: Box<dyn ResourceSource>,
    cipher: BundleCipher,
    work_dir: PathBuf,
    tests: OnceLock<TestStore>,
    definitions: OnceLock<DefinitionStore>,
    cve_fixes: OnceLock<ByTestIndex<CveFix>>,
    cve_references: OnceLock<ByTestIndex<CveReference>>,
    groups: OnceLock<GroupStore>,
    ranking: OnceLock<RankingPolicy>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("work_dir", &self.work_dir)
            .field("tests_loaded", &self.tests.get().is_some())
            .field("definitions_loaded", &self.definitions.get().is_some())
            .field("cve_fixes_loaded", &self.cve_fixes.get().is_some())
            .field("cve_references_loaded", &self.cve_references.get().is_some())
            .field("groups_loaded", &self.groups.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Row counts per catalog kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub tests: usize,
    pub definitions: usize,
    pub cve_fixes: usize,
    pub cve_references: usize,
    pub groups: usize,
    pub group_members: usize,
    pub full_detail_tests: usize,
}

impl Catalog {
    /// Creates a catalog over `source`, decrypting into `work_dir`.
    pub fn new(source: impl ResourceSource + 'static, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Box::new(source),
            cipher: BundleCipher::default(),
            work_dir: work_dir.into(),
            tests: OnceLock::new(),
            definitions: OnceLock::new(),
            cve_fixes: OnceLock::new(),
            cve_references: OnceLock::new(),
            groups: OnceLock::new(),
            ranking: OnceLock::new(),
        }
    }

    /// Creates a catalog reading sealed resources from `config.resource_dir`.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            DirectoryResources::new(&config.resource_dir),
            &config.work_dir,
        )
    }

    /// Builder method to replace the resource cipher.
    pub fn with_cipher(mut self, cipher: BundleCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Working directory that receives decrypted files.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Available tests.
    pub fn tests(&self) -> &TestStore {
        self.tests.get_or_init(|| {
            TestStore::from_rows(self.load_rows(names::AVAIL_TEST, names::AVAIL_TEST_TABLE))
        })
    }

    /// SQL bodies of query-based tests.
    pub fn definitions(&self) -> &DefinitionStore {
        self.definitions.get_or_init(|| {
            DefinitionStore::from_rows(self.load_rows(names::SQLBASED, names::SQLBASED_TABLE))
        })
    }

    /// Fixes of CVE tests, by test id.
    pub fn cve_fixes(&self) -> &ByTestIndex<CveFix> {
        self.cve_fixes.get_or_init(|| {
            ByTestIndex::from_rows(
                self.load_rows(names::CVE_FIX, names::CVE_FIX_TABLE),
                rows::cve_fix,
            )
        })
    }

    /// Advisory links of CVE tests, by test id.
    pub fn cve_references(&self) -> &ByTestIndex<CveReference> {
        self.cve_references.get_or_init(|| {
            ByTestIndex::from_rows(
                self.load_rows(names::CVE_REFERENCE, names::CVE_REFERENCE_TABLE),
                rows::cve_reference,
            )
        })
    }

    /// Exception groups, their members and types.
    pub fn groups(&self) -> &GroupStore {
        self.groups.get_or_init(|| {
            GroupStore::from_rows(
                self.load_rows(names::GROUP_DESC, names::GROUP_DESC_TABLE),
                self.load_rows(names::GROUP_MEMBER, names::GROUP_MEMBER_TABLE),
                self.load_rows(names::GROUP_TYPE, names::GROUP_TYPE_TABLE),
            )
        })
    }

    /// Ranking allow-list of full-detail query tests.
    ///
    /// Falls back to the built-in list when the catalog ships none.
    pub fn ranking_policy(&self) -> &RankingPolicy {
        self.ranking.get_or_init(|| {
            let ids: Vec<i64> = self
                .load_optional_rows(names::FULL_DETAIL, names::FULL_DETAIL_TABLE)
                .iter()
                .filter_map(|row| row.int("test_id"))
                .collect();
            if ids.is_empty() {
                tracing::debug!("Using built-in full-detail test list");
                RankingPolicy::default()
            } else {
                RankingPolicy::from_ids(ids)
            }
        })
    }

    /// Loads every kind and reports row counts.
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            tests: self.tests().len(),
            definitions: self.definitions().len(),
            cve_fixes: self.cve_fixes().len(),
            cve_references: self.cve_references().len(),
            groups: self.groups().group_count(),
            group_members: self.groups().member_count(),
            full_detail_tests: self.ranking_policy().len(),
        }
    }

    /// Reads, unseals and decodes one resource, returning the rows of
    /// `table`. Any failure yields no rows.
    pub fn load_rows(&self, resource: &str, table: &str) -> Vec<Row> {
        self.load(resource, table, false)
    }

    /// Like [`Self::load_rows`] for a resource the catalog may legitimately
    /// ship without; its absence is logged at `debug`.
    pub fn load_optional_rows(&self, resource: &str, table: &str) -> Vec<Row> {
        self.load(resource, table, true)
    }

    fn load(&self, resource: &str, table: &str, optional: bool) -> Vec<Row> {
        let sealed = match self.source.read(resource) {
            Ok(bytes) => bytes,
            Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(resource, "Optional catalog resource not shipped");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(resource, error = %e, "Catalog resource unavailable, using empty store");
                return Vec::new();
            }
        };

        let plaintext = match self.cipher.unseal(&sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(resource, error = %e, "Catalog resource could not be decrypted, using empty store");
                return Vec::new();
            }
        };

        let decoded = match self.decode_via_working_file(resource, &plaintext) {
            Ok(tables) => tables,
            Err(e) => {
                tracing::warn!(resource, error = %e, "Catalog working file failed, using empty store");
                return Vec::new();
            }
        };

        if decoded.is_empty() && !plaintext.is_empty() {
            tracing::warn!(resource, "Catalog resource is malformed, using empty store");
        }

        let rows = dump::rows_of(decoded, table);
        tracing::debug!(resource, rows = rows.len(), "Loaded catalog resource");
        rows
    }

    fn decode_via_working_file(
        &self,
        resource: &str,
        plaintext: &[u8],
    ) -> std::io::Result<Vec<dump::DumpTable>> {
        std::fs::create_dir_all(&self.work_dir)?;
        let file = WorkingFile::create(
            self.work_dir.join(format!("{}_new", resource)),
            plaintext,
        )?;
        let bytes = zeroize::Zeroizing::new(file.read()?);
        Ok(dump::decode(&bytes))
    }
}
