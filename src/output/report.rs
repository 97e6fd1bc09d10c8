//! Per-resource reports over stored crawl results

use crate::storage::{BrokenLink, HeadingRecord, LinkCounts, ResourceRecord, Storage, StorageError};
use crate::{ProbeError, ResourceId};

/// Everything stored for one resource
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub record: ResourceRecord,
    pub link_counts: LinkCounts,
    pub broken_links: Vec<BrokenLink>,
    pub headings: Vec<HeadingRecord>,
}

/// Loads the record and derived rows of a resource
///
/// # Returns
///
/// * `Ok(ResourceReport)` - The resource exists
/// * `Err(ProbeError::ResourceNotFound)` - No resource with this id
pub fn load_resource_report(
    storage: &dyn Storage,
    id: ResourceId,
) -> Result<ResourceReport, ProbeError> {
    let record = storage.get_resource(id).map_err(|e| match e {
        StorageError::ResourceNotFound(id) => ProbeError::ResourceNotFound(id),
        other => ProbeError::Storage(other),
    })?;

    Ok(ResourceReport {
        link_counts: storage.link_counts(id)?,
        broken_links: storage.broken_links(id)?,
        headings: storage.list_headings(id)?,
        record,
    })
}

pub fn print_resource_report(report: &ResourceReport) {
    let record = &report.record;

    println!("=== Resource {} ===\n", record.id);
    println!("Address:      {}", record.url);
    println!("Status:       {}", record.status);
    if let Some(message) = &record.error_message {
        println!("Error:        {}", message);
    }
    println!("Title:        {}", display_or_dash(&record.title));
    println!("HTML version: {}", display_or_dash(&record.html_version));
    println!("Owner:        {}", record.user_id);
    println!("Created:      {}", record.created_at);
    println!("Updated:      {}", record.updated_at);
    println!();

    println!(
        "Links: {} internal, {} external, {} broken",
        report.link_counts.internal,
        report.link_counts.external,
        report.broken_links.len()
    );
    for link in &report.broken_links {
        println!("  [{}] {}", link.status_code, link.href);
    }
    println!();

    println!("Headings ({}):", report.headings.len());
    for heading in &report.headings {
        println!("  {}: {}", heading.tag, heading.text);
    }
}

/// Prints one line per resource
pub fn print_resource_list(records: &[ResourceRecord]) {
    if records.is_empty() {
        println!("No resources tracked");
        return;
    }

    println!(
        "{:>6}  {:<10}  {:<10}  {:<30}  ADDRESS",
        "ID", "STATUS", "VERSION", "TITLE"
    );
    for record in records {
        println!(
            "{:>6}  {:<10}  {:<10}  {:<30}  {}",
            record.id,
            record.status.to_string(),
            display_or_dash(&record.html_version),
            truncate(&record.title, 30),
            record.url
        );
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return display_or_dash(value).to_string();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
