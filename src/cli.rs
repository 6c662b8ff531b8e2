//! Command-line surface and the async entrypoint shared by `main()` and the
//! integration tests.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::convert::convert_all;
use crate::jenkins::{JenkinsClient, JenkinsSource};
use crate::resolve::TemplateResolver;
use crate::sink::YamlFileWriter;
use crate::source::{FileSource, JobSource};

/// CLI for bjj: convert Jenkins job definitions to jenkins-job-builder YAML.
#[derive(Parser)]
#[clap(
    name = "bjj",
    version,
    about = "Convert Jenkins job XML definitions to jenkins-job-builder YAML"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one or more local config.xml files
    Convertfile {
        /// XML files to convert, one output document each
        #[clap(long = "path", required = true, num_args = 1..)]
        path: Vec<PathBuf>,

        #[clap(flatten)]
        output: OutputOpts,
    },
    /// Convert jobs fetched from a live Jenkins server
    Convertjob {
        /// Jenkins base URL
        #[clap(long)]
        jenkins_url: String,

        /// Regular expression selecting which jobs to convert
        #[clap(long, default_value = ".*")]
        job_regex: String,

        /// Jenkins user name
        #[clap(long, env = "JENKINS_USER")]
        user: Option<String>,

        /// Jenkins password or API token
        #[clap(long, env = "JENKINS_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[clap(flatten)]
        output: OutputOpts,
    },
}

#[derive(Args)]
pub struct OutputOpts {
    /// Directory holding the `.part` template fragments
    #[clap(long, default_value = "parts")]
    pub parts_dir: PathBuf,

    /// Directory the generated `.yml` files are written to
    #[clap(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Async CLI entrypoint, split from `main()` so integration tests can drive it.
pub async fn run(cli: Cli) -> Result<()> {
    let (source, output): (Box<dyn JobSource>, OutputOpts) = match cli.command {
        Commands::Convertfile { path, output } => (Box::new(FileSource::new(path)?), output),
        Commands::Convertjob {
            jenkins_url,
            job_regex,
            user,
            password,
            output,
        } => {
            let client = JenkinsClient::new(jenkins_url, user, password);
            (Box::new(JenkinsSource::new(client, &job_regex)?), output)
        }
    };

    anyhow::ensure!(
        output.parts_dir.is_dir(),
        "template directory `{}` not found",
        output.parts_dir.display()
    );

    let resolver = TemplateResolver::new(&output.parts_dir);
    let sink = YamlFileWriter::new(&output.out_dir);
    let report = convert_all(source.as_ref(), &resolver, &sink).await?;

    println!(
        "Converted {} job(s), {} failed",
        report.written.len(),
        report.failed.len()
    );
    for job in &report.written {
        println!("  {} -> {}", job.name, job.path.display());
    }
    if !report.failed.is_empty() {
        for job in &report.failed {
            eprintln!("  {}: {}", job.name, job.error);
        }
        anyhow::bail!(
            "{} of {} job(s) failed to convert",
            report.failed.len(),
            report.written.len() + report.failed.len()
        );
    }
    Ok(())
}
