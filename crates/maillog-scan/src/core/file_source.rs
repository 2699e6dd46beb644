use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use maillog_core::{CorrelateError, LineFilter, LineSource};
use tracing::debug;

/// Mail log loaded once into memory; every fetch filters the same snapshot,
/// so ids and their records come from one consistent view of a log that
/// postfix keeps appending to.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    lines: Arc<Vec<String>>
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CorrelateError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)
            .map_err(|err| CorrelateError::unavailable(path, err))?;
        if !metadata.is_file() {
            return Err(CorrelateError::unavailable(path, "not a regular file"));
        }

        let raw =
            fs::read(path).map_err(|err| CorrelateError::unavailable(path, err))?;
        // syslog occasionally carries non-UTF-8 client data; keep the line.
        let text = String::from_utf8_lossy(&raw);
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();

        debug!(
            "log source loaded: path={}, bytes={}, lines={}",
            path.display(),
            raw.len(),
            lines.len()
        );

        Ok(Self { path: path.to_path_buf(), lines: Arc::new(lines) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for FileSource {
    fn fetch(
        &self,
        filter: &LineFilter
    ) -> Result<Vec<String>, CorrelateError> {
        Ok(self
            .lines
            .iter()
            .filter(|line| filter.matches(line))
            .cloned()
            .collect())
    }
}
