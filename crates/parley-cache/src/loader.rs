//! History loader seam.
//!
//! The window never talks to a backend directly. Hosts implement
//! [`HistoryLoader`] over whatever storage or HTTP API holds the conversation.

use async_trait::async_trait;
use parley_core::{Message, MessageId};

use crate::errors::LoadError;

/// Cursor-based history fetch.
///
/// Both methods return messages in ascending timestamp order. A result shorter
/// than `limit` means there is nothing further in that direction.
#[async_trait]
pub trait HistoryLoader: Send + Sync {
    /// Up to `limit` messages strictly older than `before` (`None` when the window is empty).
    async fn load_older(
        &self,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, LoadError>;

    /// Up to `limit` messages strictly newer than `after` (`None` when the window is empty).
    async fn load_newer(
        &self,
        after: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, LoadError>;
}
