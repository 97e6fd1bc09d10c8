//! Output module for reporting stored crawl results
//!
//! This module handles:
//! - Listing tracked resources
//! - Per-resource reports (link counts, broken links, headings)
//! - Resource counts by status

mod report;
pub mod stats;

pub use report::{load_resource_report, print_resource_list, print_resource_report, ResourceReport};
pub use stats::{load_statistics, print_statistics, StatusStatistics};
