//! Pipeline stages of a single crawl task
//!
//! A task moves strictly forward through
//! `Started -> Fetching -> Parsing -> Extracting -> Persisting -> Done`,
//! and may drop to `Error` from any non-terminal stage. A cancelled task keeps
//! the stage it was interrupted in; cancellation shows up as the resource's
//! `Stopped` status.

use std::fmt;

/// Current stage of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStage {
    Started,
    Fetching,
    Parsing,
    Extracting,
    Persisting,
    Done,
    Error,
}

impl TaskStage {
    /// Returns true once the task can no longer change stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Returns the stage that follows this one on the success path
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Started => Some(Self::Fetching),
            Self::Fetching => Some(Self::Parsing),
            Self::Parsing => Some(Self::Extracting),
            Self::Extracting => Some(Self::Persisting),
            Self::Persisting => Some(Self::Done),
            Self::Done | Self::Error => None,
        }
    }

    /// Checks whether moving from this stage to `to` is allowed
    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Error || self.next() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
