/// Job state definitions for tracking extraction progress
///
/// An identifier enters the store as `Pending` and leaves it only through the
/// extraction pool, which moves it to exactly one terminal state.
use std::fmt;

/// Represents the lifecycle state of a discovered job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Discovered and waiting for extraction
    Pending,

    /// Detail record extracted and persisted
    Completed,

    /// Extraction gave up on this identifier
    Failed,
}

impl JobStatus {
    /// Returns true if no further processing is needed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Status column of a detail record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailStatus {
    Processing,
    Completed,
}

impl DetailStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}
