//! Pagination snapshot and load outcomes.

use parley_core::MessageId;
use serde::Serialize;

/// Default maximum number of messages held by a window.
pub const DEFAULT_WINDOW_SIZE: usize = 200;
/// Default edge distance at which the next page should be requested.
pub const DEFAULT_LOAD_MORE_THRESHOLD: usize = 10;

/// Which end of the window a load extends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Toward the start of the conversation.
    Older,
    /// Toward the live edge.
    Newer,
}

impl Direction {
    /// Lowercase name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Older => "older",
            Self::Newer => "newer",
        }
    }
}

/// Point-in-time view of the window's cursors and flags.
///
/// `oldest_id`/`newest_id` are the IDs of the first and last messages in the
/// window, both `None` iff it is empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    /// Capacity.
    pub window_size: usize,
    /// Edge distance that triggers the next page.
    pub load_more_threshold: usize,
    /// ID of the first message.
    pub oldest_id: Option<MessageId>,
    /// ID of the last message.
    pub newest_id: Option<MessageId>,
    /// Older history may exist beyond the window.
    pub has_more_older: bool,
    /// Newer history may exist beyond the window.
    pub has_more_newer: bool,
    /// An older-page load is in flight.
    pub is_loading_older: bool,
    /// A newer-page load is in flight.
    pub is_loading_newer: bool,
    /// Messages currently held.
    pub total_count: usize,
}

/// What a `load_*_messages` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing more in that direction, a load was already running, or no loader is set.
    Skipped,
    /// The page was merged.
    Loaded {
        /// Messages added after dedup.
        added: usize,
        /// Messages trimmed from the opposite end.
        evicted: usize,
        /// The loader signalled there is nothing further in this direction.
        exhausted: bool,
    },
    /// The window was cleared while the load was in flight; the page was dropped.
    Stale,
}
