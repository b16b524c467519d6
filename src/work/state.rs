//! Work lifecycle states and their stored tag encoding.
//!
//! The `state` hash stores one value per work id. The first byte is a tag:
//!
//! - `Q` scheduled
//! - `R` running
//! - `C` completed, followed by the completion time in epoch millis
//! - `X` canceled, followed by the cancellation time in epoch millis
//!
//! Timestamps are decimal strings appended to the tag with no separator
//! (`C1700000000000`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag byte for scheduled work.
pub const TAG_SCHEDULED: u8 = b'Q';
/// Tag byte for canceled work.
pub const TAG_CANCELED: u8 = b'X';
/// Tag byte for running work.
pub const TAG_RUNNING: u8 = b'R';
/// Tag byte for completed work.
pub const TAG_COMPLETED: u8 = b'C';

/// Lifecycle phase of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkState {
    Scheduled,
    Running,
    Completed,
    Canceled,
}

impl WorkState {
    /// All states, in lifecycle order.
    pub const ALL: [WorkState; 4] = [
        WorkState::Scheduled,
        WorkState::Running,
        WorkState::Completed,
        WorkState::Canceled,
    ];

    /// Returns the stored tag byte for this state.
    pub fn tag(self) -> u8 {
        match self {
            WorkState::Scheduled => TAG_SCHEDULED,
            WorkState::Running => TAG_RUNNING,
            WorkState::Completed => TAG_COMPLETED,
            WorkState::Canceled => TAG_CANCELED,
        }
    }

    /// Maps a tag byte back to a state.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_SCHEDULED => Some(WorkState::Scheduled),
            TAG_RUNNING => Some(WorkState::Running),
            TAG_COMPLETED => Some(WorkState::Completed),
            TAG_CANCELED => Some(WorkState::Canceled),
            _ => None,
        }
    }

    /// Returns whether no further transition is possible from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkState::Completed | WorkState::Canceled)
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkState::Scheduled => write!(f, "scheduled"),
            WorkState::Running => write!(f, "running"),
            WorkState::Completed => write!(f, "completed"),
            WorkState::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for WorkState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" | "queued" => Ok(WorkState::Scheduled),
            "running" => Ok(WorkState::Running),
            "completed" | "done" => Ok(WorkState::Completed),
            "canceled" | "cancelled" => Ok(WorkState::Canceled),
            other => Err(format!(
                "unknown work state '{}': expected scheduled, running, completed or canceled",
                other
            )),
        }
    }
}

/// A stored state value could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown work state: {raw}")]
pub struct UnknownStateTag {
    /// Lossy rendering of the stored value, for logging.
    pub raw: String,
}

/// Decoded value of one entry in the `state` hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRecord {
    pub state: WorkState,
    /// Completion or cancellation time in epoch millis, when recorded.
    pub timestamp: Option<i64>,
}

impl StateRecord {
    pub fn scheduled() -> Self {
        Self {
            state: WorkState::Scheduled,
            timestamp: None,
        }
    }

    pub fn running() -> Self {
        Self {
            state: WorkState::Running,
            timestamp: None,
        }
    }

    pub fn completed(at_millis: i64) -> Self {
        Self {
            state: WorkState::Completed,
            timestamp: Some(at_millis),
        }
    }

    pub fn canceled(at_millis: i64) -> Self {
        Self {
            state: WorkState::Canceled,
            timestamp: Some(at_millis),
        }
    }

    /// Encodes the record as stored in the `state` hash.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![self.state.tag()];
        if let Some(ts) = self.timestamp {
            bytes.extend_from_slice(ts.to_string().as_bytes());
        }
        bytes
    }

    /// Decodes a stored state value.
    ///
    /// A value made only of ASCII digits is a bare cancellation timestamp as
    /// written by older deployments, and decodes as `Canceled`.
    pub fn decode(bytes: &[u8]) -> Result<Self, UnknownStateTag> {
        let unknown = || UnknownStateTag {
            raw: String::from_utf8_lossy(bytes).into_owned(),
        };

        let (&tag, rest) = bytes.split_first().ok_or_else(unknown)?;

        if let Some(state) = WorkState::from_tag(tag) {
            let timestamp = if state.is_terminal() {
                parse_millis(rest)
            } else {
                None
            };
            return Ok(Self { state, timestamp });
        }

        if bytes.iter().all(u8::is_ascii_digit) {
            return Ok(Self {
                state: WorkState::Canceled,
                timestamp: parse_millis(bytes),
            });
        }

        Err(unknown())
    }
}

fn parse_millis(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
