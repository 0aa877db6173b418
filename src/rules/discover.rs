//! Locate executable rules under a directory.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::RuleError;

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

/// Every executable file under `dir`, recursively, sorted by path.
///
/// Symlinked directories are not descended into. A symlink to an executable
/// file counts as a rule; a dangling one is skipped. A missing directory
/// yields an empty list.
///
/// # Errors
///
/// Returns [`RuleError::Discover`] when a directory cannot be read.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, RuleError> {
    let mut found = Vec::new();
    if !dir.exists() {
        debug!(dir = %dir.display(), "rules directory does not exist");
        return Ok(found);
    }

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| RuleError::Discover {
            path: err.path().unwrap_or(dir).to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        // Resolves symlinks; dangling links have no metadata.
        let Ok(meta) = std::fs::metadata(entry.path()) else {
            continue;
        };
        if meta.is_file() && is_executable(&meta) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    debug!(dir = %dir.display(), count = found.len(), "rules discovered");
    Ok(found)
}
