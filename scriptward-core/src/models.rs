use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::console::{SCRIPT_STDERR_TAG, SCRIPT_STDOUT_TAG};

/// One of the two output channels of a supervised script
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    /// Console tag prefixed to every relayed line of this channel
    pub fn tag(self) -> &'static str {
        match self {
            Channel::Stdout => SCRIPT_STDOUT_TAG,
            Channel::Stderr => SCRIPT_STDERR_TAG,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => f.write_str("stdout"),
            Channel::Stderr => f.write_str("stderr"),
        }
    }
}

/// How a supervised script ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The script exited on its own with this code
    Exited { code: i32 },
    /// The script was terminated by a signal it did not handle
    Signaled { signal: i32 },
    /// The timeout elapsed and the supervisor killed the script
    TimedOut { timeout_secs: u64, signal: i32 },
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited { code: 0 })
    }

    /// Exit code of a normal exit, `None` for signal or timeout terminations
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited { code } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited { code } => write!(f, "exited with status {}", code),
            ExitOutcome::Signaled { signal } => write!(f, "terminated by signal {}", signal),
            ExitOutcome::TimedOut {
                timeout_secs,
                signal,
            } => write!(
                f,
                "timed out after {} seconds and was killed by signal {}",
                timeout_secs, signal
            ),
        }
    }
}

/// Result of one supervised script run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub script: PathBuf,
    pub outcome: ExitOutcome,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
