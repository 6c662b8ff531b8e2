//! bjj: convert Jenkins job definitions (XML) into jenkins-job-builder YAML.
//!
//! The pipeline is a straight line: a [`source::JobSource`] yields named
//! parsed-XML trees, the [`resolve::TemplateResolver`] renders each tree
//! against a directory of `.part` template fragments, and a [`sink::JobSink`]
//! persists one output document per job. [`convert::convert_all`] wires the
//! three together.

pub mod cli;
pub mod convert;
pub mod jenkins;
pub mod resolve;
pub mod sink;
pub mod source;
pub mod tree;
