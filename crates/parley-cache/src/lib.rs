//! # parley-cache
//!
//! A bounded, bidirectional window over an unbounded conversation.
//!
//! [`MessageWindow`] keeps at most `window_size` messages in memory. Live
//! messages append at the back; history pages fetched through a
//! [`HistoryLoader`] extend either end, and the opposite end is trimmed to
//! stay within capacity. [`PaginationState`] exposes the cursors a view needs
//! to decide when to fetch the next page.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod pagination;
pub mod window;

pub use errors::LoadError;
pub use loader::HistoryLoader;
pub use pagination::{
    DEFAULT_LOAD_MORE_THRESHOLD, DEFAULT_WINDOW_SIZE, Direction, LoadOutcome, PaginationState,
};
pub use parley_core::MessagePatch;
pub use window::{MessageWindow, WindowConfig};
