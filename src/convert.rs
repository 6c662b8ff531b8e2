//! Coordinating module for the list-fetch-resolve-write pipeline.
//!
//! Jobs are processed strictly one after another; a failure in one job is
//! logged, recorded in the report and does not abort its siblings. Only a
//! failure to list the jobs in the first place aborts the run.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::resolve::{ResolveError, TemplateResolver};
use crate::sink::{JobSink, WriteError};
use crate::source::{JobSource, SourceError};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Outcome of one batch conversion.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub written: Vec<WrittenJob>,
    pub failed: Vec<FailedJob>,
}

#[derive(Debug)]
pub struct WrittenJob {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FailedJob {
    pub name: String,
    pub error: ConvertError,
}

/// Converts every job the source yields, writing one output document per job.
pub async fn convert_all<S, K>(
    source: &S,
    resolver: &TemplateResolver,
    sink: &K,
) -> Result<ConvertReport, SourceError>
where
    S: JobSource + ?Sized,
    K: JobSink + ?Sized,
{
    let names = source.job_names().await?;
    info!(jobs = names.len(), "starting conversion");

    let mut report = ConvertReport::default();
    for name in names {
        match convert_one(source, resolver, sink, &name).await {
            Ok(path) => {
                info!(job = %name, path = %path.display(), "job converted");
                report.written.push(WrittenJob { name, path });
            }
            Err(e) => {
                error!(job = %name, error = %e, "job conversion failed");
                report.failed.push(FailedJob { name, error: e });
            }
        }
    }

    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "conversion finished"
    );
    Ok(report)
}

async fn convert_one<S, K>(
    source: &S,
    resolver: &TemplateResolver,
    sink: &K,
    name: &str,
) -> Result<PathBuf, ConvertError>
where
    S: JobSource + ?Sized,
    K: JobSink + ?Sized,
{
    let tree = source.job_tree(name).await?;
    let rendered = resolver.render_job(&tree)?;
    let path = sink.write_job(name, &rendered).await?;
    Ok(path)
}
