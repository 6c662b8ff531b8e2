//! Job sources: anything that can list job names and produce a parsed job
//! tree per name. File-based conversion lives here; the Jenkins-backed
//! implementation lives in [`crate::jenkins`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

use crate::tree::{parse_tree, JobTree, XmlError};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{name}` is not well-formed XML")]
    Parse {
        name: String,
        #[source]
        source: XmlError,
    },
    #[error("no such job `{name}`")]
    UnknownJob { name: String },
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("unexpected response from {url}: {detail}")]
    Api { url: String, detail: String },
    #[error("invalid Jenkins URL `{url}`")]
    Url { url: String },
    #[error("duplicate job name `{name}` from `{}`", .path.display())]
    DuplicateName { name: String, path: PathBuf },
    #[error("invalid job name pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A finite sequence of named jobs, consumed one at a time by the conversion
/// pipeline. Implemented by [`FileSource`] and [`crate::jenkins::JenkinsSource`],
/// and by mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Lists the names of all jobs this source will yield.
    async fn job_names(&self) -> Result<Vec<String>, SourceError>;

    /// Fetches and parses the configuration of one job.
    async fn job_tree(&self, name: &str) -> Result<JobTree, SourceError>;
}

/// Reads jobs from local `config.xml` files. The job name is the file stem.
#[derive(Debug)]
pub struct FileSource {
    files: Vec<(String, PathBuf)>,
}

impl FileSource {
    /// Builds a source over the given files. Two paths with the same stem
    /// would silently produce one output overwriting the other, so duplicate
    /// job names are rejected up front.
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, SourceError> {
        let mut files: Vec<(String, PathBuf)> = Vec::with_capacity(paths.len());
        for path in paths {
            let name = job_name_for(&path);
            if files.iter().any(|(taken, _)| taken == &name) {
                return Err(SourceError::DuplicateName { name, path });
            }
            files.push((name, path));
        }
        Ok(Self { files })
    }
}

fn job_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[async_trait]
impl JobSource for FileSource {
    async fn job_names(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.files.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn job_tree(&self, name: &str) -> Result<JobTree, SourceError> {
        let (_, path) = self
            .files
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| SourceError::UnknownJob { name: name.into() })?;
        debug!(job = %name, path = %path.display(), "reading job definition");
        let xml = std::fs::read_to_string(path).map_err(|e| SourceError::Read {
            path: path.clone(),
            source: e,
        })?;
        parse_tree(&xml).map_err(|e| SourceError::Parse {
            name: name.into(),
            source: e,
        })
    }
}
