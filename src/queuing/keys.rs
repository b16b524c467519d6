//! Store key layout.
//!
//! Every key starts with the configured prefix. Two hashes are shared by all
//! queues, the membership collections are per queue:
//!
//! | Key | Type | Contents |
//! |---|---|---|
//! | `<prefix>data` | hash | work id -> encoded work item |
//! | `<prefix>state` | hash | work id -> state tag (+ millis) |
//! | `<prefix>queue:<queueId>` | list | scheduled ids, pushed at head, popped at tail |
//! | `<prefix>run:<queueId>` | set | running ids |
//! | `<prefix>done:<queueId>` | set | completed ids |
//! | `<prefix>prev:<queueId>` | list | suspended ids |
//! | `<prefix>cancel:<queueId>` | set | canceled ids |

use std::fmt;

use crate::work::WorkState;

const KEY_DATA: &str = "data";
const KEY_STATE: &str = "state";

/// A per-queue membership collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    Scheduled,
    Running,
    Completed,
    Suspended,
    Canceled,
}

impl Membership {
    pub const ALL: [Membership; 5] = [
        Membership::Scheduled,
        Membership::Running,
        Membership::Completed,
        Membership::Suspended,
        Membership::Canceled,
    ];

    /// Key segment placed between the global prefix and the queue id.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Membership::Scheduled => "queue:",
            Membership::Running => "run:",
            Membership::Completed => "done:",
            Membership::Suspended => "prev:",
            Membership::Canceled => "cancel:",
        }
    }

    /// Ordered lists are consumed from the tail, the rest are sets.
    pub fn is_list(self) -> bool {
        matches!(self, Membership::Scheduled | Membership::Suspended)
    }
}

impl From<WorkState> for Membership {
    fn from(state: WorkState) -> Self {
        match state {
            WorkState::Scheduled => Membership::Scheduled,
            WorkState::Running => Membership::Running,
            WorkState::Completed => Membership::Completed,
            WorkState::Canceled => Membership::Canceled,
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::Scheduled => write!(f, "scheduled"),
            Membership::Running => write!(f, "running"),
            Membership::Completed => write!(f, "completed"),
            Membership::Suspended => write!(f, "suspended"),
            Membership::Canceled => write!(f, "canceled"),
        }
    }
}

/// Builds store keys from the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Shared hash of work id -> encoded work item.
    pub fn data_key(&self) -> String {
        format!("{}{}", self.prefix, KEY_DATA)
    }

    /// Shared hash of work id -> state record.
    pub fn state_key(&self) -> String {
        format!("{}{}", self.prefix, KEY_STATE)
    }

    /// Key of a queue's membership collection.
    pub fn queue_key(&self, membership: Membership, queue_id: &str) -> String {
        format!("{}{}", self.membership_prefix(membership), queue_id)
    }

    /// Common prefix of every queue key for a membership.
    pub fn membership_prefix(&self, membership: Membership) -> String {
        format!("{}{}", self.prefix, membership.key_prefix())
    }

    pub fn scheduled_key(&self, queue_id: &str) -> String {
        self.queue_key(Membership::Scheduled, queue_id)
    }

    pub fn running_key(&self, queue_id: &str) -> String {
        self.queue_key(Membership::Running, queue_id)
    }

    pub fn completed_key(&self, queue_id: &str) -> String {
        self.queue_key(Membership::Completed, queue_id)
    }

    pub fn suspended_key(&self, queue_id: &str) -> String {
        self.queue_key(Membership::Suspended, queue_id)
    }

    pub fn canceled_key(&self, queue_id: &str) -> String {
        self.queue_key(Membership::Canceled, queue_id)
    }

    /// Extracts the queue id from a membership key, if it is one.
    pub fn queue_id_from_key<'a>(&self, membership: Membership, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix(membership.key_prefix())
    }
}
