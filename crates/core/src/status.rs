// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage and step status values

use serde::{Deserialize, Serialize};

/// Status of a stage or step as understood by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Error,
    Killed,
    Skipped,
    Declined,
}

impl Status {
    /// True once the stage or step can no longer change state.
    pub fn is_done(&self) -> bool {
        !matches!(self, Status::Pending | Status::Running)
    }

    /// True when the status counts against the pipeline outcome.
    pub fn is_failing(&self) -> bool {
        matches!(self, Status::Failure | Status::Error | Status::Killed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Error => "error",
            Status::Killed => "killed",
            Status::Skipped => "skipped",
            Status::Declined => "declined",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_statuses() {
        assert!(!Status::Pending.is_done());
        assert!(!Status::Running.is_done());
        assert!(Status::Success.is_done());
        assert!(Status::Failure.is_done());
        assert!(Status::Skipped.is_done());
    }

    #[test]
    fn failing_statuses() {
        assert!(Status::Failure.is_failing());
        assert!(Status::Error.is_failing());
        assert!(Status::Killed.is_failing());
        assert!(!Status::Success.is_failing());
        assert!(!Status::Skipped.is_failing());
    }

    #[test]
    fn wire_format_is_lowercase() {
        let json = serde_json::to_string(&Status::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
        let status: Status = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(status, Status::Skipped);
    }
}
