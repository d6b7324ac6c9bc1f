//! Queue message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest batch the queue service returns per receive/peek
pub const MAX_MESSAGES_PER_REQUEST: usize = 32;

/// Default message time-to-live (seven days)
pub const DEFAULT_MESSAGE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Longest visibility timeout the service accepts (seven days)
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// A queue message as returned by send, peek and receive.
///
/// `pop_receipt` is only present on sent and received messages; it is
/// required to delete a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: Option<String>,
    pub body: String,
    pub inserted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub next_visible_at: Option<DateTime<Utc>>,
    pub dequeue_count: u64,
}

/// Clamp a requested message count to what the service accepts.
#[must_use]
pub fn clamp_message_count(requested: usize) -> usize {
    requested.clamp(1, MAX_MESSAGES_PER_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_message_count() {
        assert_eq!(clamp_message_count(0), 1);
        assert_eq!(clamp_message_count(5), 5);
        assert_eq!(clamp_message_count(100), 32);
    }
}
