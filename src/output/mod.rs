//! Output module for writing templates and reports
//!
//! This module handles:
//! - Writing the template descriptor as JSON and reading it back
//! - Generating the markdown summary of a template
//! - Displaying crawl and cache statistics

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_crawl_report, print_statistics, StoreStatistics};

use crate::config::Config;
use crate::crawler::CrawlOutcome;
use crate::template::TemplateDescriptor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Template JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Paths of the written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub template: PathBuf,
    pub summary: PathBuf,
}

/// Where the artifacts of a project are written
pub fn artifact_paths(config: &Config) -> Artifacts {
    let project_dir = &config.project.project_dir;
    Artifacts {
        template: project_dir.join(&config.output.template_path),
        summary: project_dir.join(&config.output.summary_path),
    }
}

/// Reads a descriptor written by an earlier run
///
/// # Returns
///
/// * `Ok(Some(descriptor))` - The file holds a descriptor
/// * `Ok(None)` - No file at `path`
/// * `Err(OutputError)` - The file could not be read or is not a descriptor
pub fn load_template(path: &Path) -> OutputResult<Option<TemplateDescriptor>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&json)?))
}

/// Writes the descriptor as pretty-printed JSON
pub fn write_template(descriptor: &TemplateDescriptor, output_path: &Path) -> OutputResult<()> {
    let json = descriptor.to_json()?;
    std::fs::write(output_path, json + "\n")?;
    Ok(())
}

/// Writes the JSON descriptor and the markdown summary into the project
/// directory
///
/// # Arguments
///
/// * `config` - Supplies the project directory and artifact paths
/// * `descriptor` - The synthesized template
/// * `crawl` - The crawl that produced the documents
///
/// # Returns
///
/// * `Ok(Artifacts)` - Where the files were written
/// * `Err(OutputError)` - A file could not be written
pub fn write_artifacts(
    config: &Config,
    descriptor: &TemplateDescriptor,
    crawl: Option<&CrawlOutcome>,
) -> OutputResult<Artifacts> {
    std::fs::create_dir_all(&config.project.project_dir)?;

    let artifacts = artifact_paths(config);

    write_template(descriptor, &artifacts.template)?;
    generate_markdown_summary(descriptor, crawl, &artifacts.summary)?;

    tracing::info!(
        "Wrote {} and {}",
        artifacts.template.display(),
        artifacts.summary.display()
    );
    Ok(artifacts)
}
