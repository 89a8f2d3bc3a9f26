//! Markdown summary generation
//!
//! This module renders a template descriptor as a human-readable summary:
//! crawl figures, the invariant skeleton as an indented outline, and one
//! section per variant field.

use crate::crawler::{CrawlOutcome, CrawlStatus};
use crate::output::OutputResult;
use crate::template::{FieldTarget, Marking, SkeletonNode, TemplateDescriptor};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Samples listed per field before the list is cut short
const MAX_SAMPLES: usize = 10;

/// Writes the markdown summary of a template
///
/// # Arguments
///
/// * `descriptor` - The synthesized template
/// * `crawl` - The crawl that produced the documents, if any
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(
    descriptor: &TemplateDescriptor,
    crawl: Option<&CrawlOutcome>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(descriptor, crawl);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a template as markdown
pub fn format_markdown_summary(descriptor: &TemplateDescriptor, crawl: Option<&CrawlOutcome>) -> String {
    let mut md = String::new();

    md.push_str("# Stencil Template Summary\n\n");

    if let Some(crawl) = crawl {
        md.push_str("## Crawl\n\n");
        md.push_str(&format!("- **Status**: {}\n", describe_status(&crawl.status)));
        md.push_str(&format!("- **Dispatched**: {}\n", crawl.stats.dispatched));
        md.push_str(&format!("- **Cache Hits**: {}\n", crawl.stats.cache_hits));
        md.push_str(&format!(
            "- **Fetched**: {} ({} rendered)\n",
            crawl.stats.fetched, crawl.stats.rendered
        ));
        md.push_str(&format!(
            "- **Failed**: {} ({} behind a challenge)\n",
            crawl.stats.failed + crawl.stats.challenged,
            crawl.stats.challenged
        ));
        md.push_str(&format!("- **Duration**: {:.1}s\n\n", crawl.elapsed.as_secs_f64()));
    }

    md.push_str("## Template\n\n");
    md.push_str(&format!("- **Documents**: {}\n", descriptor.document_count));
    md.push_str(&format!("- **Skeleton Nodes**: {}\n", descriptor.skeleton.size()));
    md.push_str(&format!("- **Fields**: {}\n\n", descriptor.fields.len()));

    md.push_str("## Skeleton\n\n");
    md.push_str("```text\n");
    outline(&descriptor.skeleton, 0, &mut md);
    md.push_str("```\n\n");

    if descriptor.fields.is_empty() {
        md.push_str("No variant fields: every sampled page has identical content.\n");
        return md;
    }

    md.push_str("## Fields\n\n");
    for field in &descriptor.fields {
        md.push_str(&format!("### {}\n\n", field.name));
        md.push_str(&format!("- **Selector**: `{}`\n", field.selector()));
        let target = match &field.target {
            FieldTarget::Text => "text".to_string(),
            FieldTarget::Attribute { name } => format!("attribute `{}`", name),
            FieldTarget::Subtree => "optional subtree".to_string(),
        };
        md.push_str(&format!("- **Extracts**: {}\n", target));
        md.push_str(&format!("- **Samples** ({}):\n", field.samples.len()));
        for sample in field.samples.iter().take(MAX_SAMPLES) {
            md.push_str(&format!("  - `{}`\n", sample.replace('`', "'")));
        }
        if field.samples.len() > MAX_SAMPLES {
            md.push_str(&format!("  - ... and {} more\n", field.samples.len() - MAX_SAMPLES));
        }
        md.push('\n');
    }

    md
}

fn describe_status(status: &CrawlStatus) -> String {
    match status {
        CrawlStatus::CompletedNormally => "completed".to_string(),
        CrawlStatus::StoppedAtLimit => "stopped at page limit".to_string(),
        CrawlStatus::Interrupted => "interrupted".to_string(),
        CrawlStatus::Aborted(error) => format!("aborted ({})", error),
    }
}

fn outline(node: &SkeletonNode, indent: usize, md: &mut String) {
    md.push_str(&"  ".repeat(indent));
    md.push_str(&node.selector_step());
    if node.marking == Marking::Variant {
        md.push_str("  *");
    }
    if let Some(text) = &node.text {
        let shown: String = text.chars().take(40).collect();
        md.push_str(&format!("  \"{}\"", shown));
    }
    md.push('\n');

    for child in &node.children {
        outline(child, indent + 1, md);
    }
}
