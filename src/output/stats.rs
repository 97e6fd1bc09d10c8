//! Status statistics from the resource database
//!
//! This module provides functionality for counting tracked resources by
//! status and displaying the totals.

use crate::state::ResourceStatus;
use crate::storage::Storage;
use crate::ProbeError;

/// Resource counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusStatistics {
    /// Total number of tracked resources
    pub total: u64,

    /// Count per status, in status order, including zero counts
    pub by_status: Vec<(ResourceStatus, u64)>,
}

impl StatusStatistics {
    pub fn count(&self, status: ResourceStatus) -> u64 {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StatusStatistics)` - Successfully loaded statistics
/// * `Err(ProbeError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<StatusStatistics, ProbeError> {
    let mut stats = StatusStatistics::default();

    for status in ResourceStatus::all() {
        let count = storage.count_resources_by_status(status)?;
        stats.total += count;
        stats.by_status.push((status, count));
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StatusStatistics) {
    println!("=== Resource Statistics ===\n");
    println!("Total resources: {}", stats.total);

    for (status, count) in &stats.by_status {
        let percentage = if stats.total > 0 {
            (*count as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {:<10} {:>6} ({:.1}%)", status, count, percentage);
    }
}
