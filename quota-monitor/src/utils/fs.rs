//! Filesystem helpers with operation + path error context.

use std::path::Path;

use crate::{Error, Result};

/// Ensure a directory exists, creating it recursively if needed.
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

/// Ensure the directory holding a file-backed SQLite database exists.
///
/// In-memory URLs and bare file names in the working directory need nothing.
pub fn ensure_sqlite_parent_dir(database_url: &str) -> Result<()> {
    let Some(file) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            ensure_dir_all_sync_with_op("creating database directory", parent)
        }
        _ => Ok(()),
    }
}

fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next()?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(Path::new(path))
}
