//! Output writer: persists each job's rendered text block as a `.yml` file
//! named after the job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for rendered job definitions.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Persists one rendered job and returns where it landed.
    async fn write_job(&self, name: &str, rendered: &str) -> Result<PathBuf, WriteError>;
}

/// Writes `<out_dir>/<job-name>.yml` in a single truncating write. No atomic
/// rename: a failure partway through can leave a truncated file.
pub struct YamlFileWriter {
    out_dir: PathBuf,
}

impl YamlFileWriter {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl JobSink for YamlFileWriter {
    async fn write_job(&self, name: &str, rendered: &str) -> Result<PathBuf, WriteError> {
        let path = self.out_dir.join(format!("{name}.yml"));
        std::fs::write(&path, rendered).map_err(|e| WriteError::Io {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), bytes = rendered.len(), "wrote job definition");
        Ok(path)
    }
}
