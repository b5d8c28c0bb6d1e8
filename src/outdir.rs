use crate::error::RunError;
use std::fs;
use std::path::{Path, PathBuf};

/// Make sure a step's declared output directory exists under `workdir`.
///
/// Existing directories and their contents are left untouched.
pub fn ensure_output_dir(workdir: &Path, rel: &str) -> Result<PathBuf, RunError> {
    let path = workdir.join(rel);
    if path.is_dir() {
        return Ok(path);
    }
    fs::create_dir_all(&path).map_err(|err| RunError::io(&path, err))?;
    tracing::debug!(path = %path.display(), "created output directory");
    Ok(path)
}
