//! Working-directory file helpers shared by the registry and driver store.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::error::DbAssessError;

/// Writes `contents` to `path` through a sibling temp file and a rename,
/// so readers never observe a half-written store.
///
/// # Errors
/// Returns [`DbAssessError::Persistence`] naming `store` on any I/O failure.
pub fn write_atomic(path: &Path, contents: &str, store: &str) -> Result<()> {
    let fail = |context: String, e: std::io::Error| DbAssessError::persistence(store, context, e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| fail(format!("creating {}", parent.display()), e))?;
    }

    let tmp = sibling(path, ".tmp");
    let written = private_options()
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(fail(format!("writing {}", path.display()), e));
    }
    Ok(())
}

/// Reads `path`, returning `None` when it does not exist.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DbAssessError::io(format!("reading {}", path.display()), e)),
    }
}

/// A decrypted catalog file that is removed when dropped.
pub(crate) struct WorkingFile {
    path: PathBuf,
}

impl WorkingFile {
    /// Creates `path` readable and writable by the owner only and fills it.
    ///
    /// The file is always created fresh, so a stale file or a planted
    /// symlink at `path` is removed rather than followed.
    pub(crate) fn create(path: PathBuf, contents: &[u8]) -> std::io::Result<Self> {
        let mut file = match exclusive_options().open(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                fs::remove_file(&path)?;
                exclusive_options().open(&path)?
            }
            opened => opened?,
        };
        let guard = Self { path };
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(guard)
    }

    pub(crate) fn read(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove working file");
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    owner_only(&mut options);
    options
}

/// Fails with `AlreadyExists` instead of opening anything already at the
/// path, symlinks included.
fn exclusive_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    owner_only(&mut options);
    options
}

fn owner_only(options: &mut OpenOptions) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = options;
}
