//! Where sealed catalog resources come from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Fixed resource and table names of the bundled catalogs.
pub mod names {
    /// Available tests
    pub const AVAIL_TEST: &str = "avail_test.dump";
    /// Table inside [`AVAIL_TEST`]
    pub const AVAIL_TEST_TABLE: &str = "AVAILABLE_TEST";
    /// SQL bodies of query-based tests
    pub const SQLBASED: &str = "sqlbased.dump";
    /// Table inside [`SQLBASED`]
    pub const SQLBASED_TABLE: &str = "SQLBASED_ASSESSMENT_DEFINITION";
    /// CVE fixes
    pub const CVE_FIX: &str = "cve_fix.dump";
    /// Table inside [`CVE_FIX`]
    pub const CVE_FIX_TABLE: &str = "CVE_FIX";
    /// CVE references
    pub const CVE_REFERENCE: &str = "cve_reference.dump";
    /// Table inside [`CVE_REFERENCE`]
    pub const CVE_REFERENCE_TABLE: &str = "CVE_REFERENCE";
    /// Exception groups
    pub const GROUP_DESC: &str = "group_desc.dump";
    /// Table inside [`GROUP_DESC`]
    pub const GROUP_DESC_TABLE: &str = "GROUP_DESC";
    /// Exception group members
    pub const GROUP_MEMBER: &str = "group_member.dump";
    /// Table inside [`GROUP_MEMBER`]
    pub const GROUP_MEMBER_TABLE: &str = "GROUP_MEMBER";
    /// Exception group types
    pub const GROUP_TYPE: &str = "group_type.dump";
    /// Table inside [`GROUP_TYPE`]
    pub const GROUP_TYPE_TABLE: &str = "GROUP_TYPE";
    /// Driver templates
    pub const DB_DRIVER: &str = "dbdriver.dump";
    /// Table inside [`DB_DRIVER`]
    pub const DB_DRIVER_TABLE: &str = "DB_DRIVER";
    /// Full-detail ranking allow-list
    pub const FULL_DETAIL: &str = "full_detail.dump";
    /// Table inside [`FULL_DETAIL`]
    pub const FULL_DETAIL_TABLE: &str = "FULL_DETAIL_TEST";

    /// Every sealed resource a complete catalog ships.
    pub const ALL: [&str; 9] = [
        AVAIL_TEST,
        SQLBASED,
        CVE_FIX,
        CVE_REFERENCE,
        GROUP_DESC,
        GROUP_MEMBER,
        GROUP_TYPE,
        DB_DRIVER,
        FULL_DETAIL,
    ];
}

/// Supplies sealed resource bytes by name.
pub trait ResourceSource: Send + Sync {
    /// Reads the named resource.
    ///
    /// # Errors
    /// Returns `NotFound` when the resource does not exist.
    fn read(&self, name: &str) -> std::io::Result<Vec<u8>>;
}

/// Resources stored as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    dir: PathBuf,
}

impl DirectoryResources {
    /// Creates a source rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ResourceSource for DirectoryResources {
    fn read(&self, name: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.dir.join(name))
    }
}

/// Resources held in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryResources {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method adding a sealed resource.
    pub fn with(mut self, name: impl Into<String>, sealed: Vec<u8>) -> Self {
        self.resources.insert(name.into(), sealed);
        self
    }
}

impl ResourceSource for MemoryResources {
    fn read(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self.resources.get(name).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("resource {} not bundled", name),
            )
        })
    }
}
