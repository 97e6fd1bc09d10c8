/// Resource status definitions for tracking crawl progress
///
/// A resource holds exactly one of these statuses at any instant.
use std::fmt;

/// Represents the current status of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    // ===== Active States =====
    /// Resource has been added and is waiting for a crawl request
    Queued,

    /// A crawl task is registered for the resource
    Processing,

    // ===== Terminal States =====
    /// The last crawl completed successfully
    Done,

    /// The last crawl failed; an error message is stored alongside
    Error,

    /// The last crawl was cancelled by a stop request
    Stopped,
}

impl ResourceStatus {
    /// Returns true if no further automatic transition follows this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Stopped)
    }

    /// Returns true if this status may be started by a crawl request
    pub fn is_startable(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Queued,
            Self::Processing,
            Self::Done,
            Self::Error,
            Self::Stopped,
        ]
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}
