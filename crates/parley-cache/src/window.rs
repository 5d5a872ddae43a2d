//! Bounded message window.
//!
//! Holds at most `window_size` messages in insertion order with no duplicate
//! IDs. Live messages append at the back and evict from the front. History
//! pages extend one end and trim the opposite end: an older page sacrifices
//! the newest messages, a newer page sacrifices the oldest.
//!
//! State sits behind one mutex per window. The lock is never held across the
//! loader call, so `add_message` keeps working while a page is in flight.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use parley_core::{Message, MessageId, MessagePatch};
use tracing::{debug, warn};

use crate::errors::LoadError;
use crate::loader::HistoryLoader;
use crate::pagination::{
    DEFAULT_LOAD_MORE_THRESHOLD, DEFAULT_WINDOW_SIZE, Direction, LoadOutcome, PaginationState,
};

/// Window sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    /// Maximum messages held. Always at least 1.
    pub window_size: usize,
    /// Edge distance at which [`MessageWindow::should_load_older`] and
    /// [`MessageWindow::should_load_newer`] fire.
    pub load_more_threshold: usize,
}

impl WindowConfig {
    /// Build a config, clamping `window_size` to at least 1.
    pub fn new(window_size: usize, load_more_threshold: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            load_more_threshold,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_LOAD_MORE_THRESHOLD)
    }
}

struct WindowState {
    messages: VecDeque<Message>,
    ids: HashSet<MessageId>,
    has_more_older: bool,
    has_more_newer: bool,
    loading_older: bool,
    loading_newer: bool,
    /// Bumped by `clear_messages`; loads started under an older epoch are dropped.
    epoch: u64,
}

impl WindowState {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            ids: HashSet::new(),
            has_more_older: true,
            has_more_newer: false,
            loading_older: false,
            loading_newer: false,
            epoch: 0,
        }
    }

    fn reset(&mut self) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self::new();
        self.epoch = epoch;
    }

    fn loading(&self, direction: Direction) -> bool {
        match direction {
            Direction::Older => self.loading_older,
            Direction::Newer => self.loading_newer,
        }
    }

    fn set_loading(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Older => self.loading_older = value,
            Direction::Newer => self.loading_newer = value,
        }
    }

    fn has_more(&self, direction: Direction) -> bool {
        match direction {
            Direction::Older => self.has_more_older,
            Direction::Newer => self.has_more_newer,
        }
    }

    fn set_has_more(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Older => self.has_more_older = value,
            Direction::Newer => self.has_more_newer = value,
        }
    }

    /// Keep only messages whose IDs are not yet present, registering them.
    fn claim_fresh(&mut self, batch: impl IntoIterator<Item = Message>) -> Vec<Message> {
        batch
            .into_iter()
            .filter(|m| self.ids.insert(m.id.clone()))
            .collect()
    }

    fn trim_front(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.messages.len() > capacity {
            let Some(m) = self.messages.pop_front() else {
                break;
            };
            let _ = self.ids.remove(&m.id);
            evicted += 1;
        }
        if evicted > 0 {
            self.has_more_older = true;
        }
        evicted
    }

    fn trim_back(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.messages.len() > capacity {
            let Some(m) = self.messages.pop_back() else {
                break;
            };
            let _ = self.ids.remove(&m.id);
            evicted += 1;
        }
        if evicted > 0 {
            self.has_more_newer = true;
        }
        evicted
    }

    fn edge_id(&self, direction: Direction) -> Option<MessageId> {
        match direction {
            Direction::Older => self.messages.front(),
            Direction::Newer => self.messages.back(),
        }
        .map(|m| m.id.clone())
    }
}

/// Clears the loading flag if a load future is dropped before the loader returns.
struct LoadingGuard<'a> {
    state: &'a Mutex<WindowState>,
    direction: Direction,
    epoch: u64,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.epoch == self.epoch {
            state.set_loading(self.direction, false);
        }
    }
}

/// Ordered, deduplicated, capacity-bounded message store with paging cursors.
pub struct MessageWindow {
    config: WindowConfig,
    state: Mutex<WindowState>,
    loader: Option<Arc<dyn HistoryLoader>>,
}

impl MessageWindow {
    /// Empty window without a history loader. Loads are skipped until one is set.
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState::new()),
            loader: None,
        }
    }

    /// Attach the history loader used by the `load_*_messages` calls.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn HistoryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Sizing this window was built with.
    pub fn config(&self) -> WindowConfig {
        self.config
    }

    /// Append a message unless its ID is already present.
    ///
    /// Overflow evicts from the front. Returns whether the message was added.
    pub fn add_message(&self, message: Message) -> bool {
        self.add_messages(std::iter::once(message)) == 1
    }

    /// Append every message whose ID is not already present, in order.
    ///
    /// Duplicates within the batch keep their first occurrence. The window is
    /// trimmed once after the whole batch is merged. Returns the number added.
    pub fn add_messages(&self, batch: impl IntoIterator<Item = Message>) -> usize {
        let mut state = self.state.lock();
        let fresh = state.claim_fresh(batch);
        let added = fresh.len();
        state.messages.extend(fresh);
        let evicted = state.trim_front(self.config.window_size);
        if evicted > 0 {
            debug!(added, evicted, "window overflow, trimmed oldest");
        }
        added
    }

    /// Fetch the page before the oldest message and prepend it.
    ///
    /// Overflow trims the newest messages and marks `has_more_newer`.
    pub async fn load_older_messages(&self) -> Result<LoadOutcome, LoadError> {
        self.load(Direction::Older).await
    }

    /// Fetch the page after the newest message and append it.
    ///
    /// Overflow trims the oldest messages and marks `has_more_older`.
    pub async fn load_newer_messages(&self) -> Result<LoadOutcome, LoadError> {
        self.load(Direction::Newer).await
    }

    async fn load(&self, direction: Direction) -> Result<LoadOutcome, LoadError> {
        let Some(loader) = self.loader.as_ref() else {
            return Ok(LoadOutcome::Skipped);
        };

        let (cursor, epoch) = {
            let mut state = self.state.lock();
            if !state.has_more(direction) || state.loading(direction) {
                return Ok(LoadOutcome::Skipped);
            }
            state.set_loading(direction, true);
            (state.edge_id(direction), state.epoch)
        };
        let mut guard = LoadingGuard {
            state: &self.state,
            direction,
            epoch,
            armed: true,
        };

        let limit = self.config.window_size;
        debug!(direction = direction.as_str(), cursor = ?cursor, limit, "loading history page");
        let result = match direction {
            Direction::Older => loader.load_older(cursor.as_ref(), limit).await,
            Direction::Newer => loader.load_newer(cursor.as_ref(), limit).await,
        };
        guard.armed = false;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(
                direction = direction.as_str(),
                "window cleared during load, dropping page"
            );
            return Ok(LoadOutcome::Stale);
        }
        state.set_loading(direction, false);

        let page = result.inspect_err(|e| {
            warn!(direction = direction.as_str(), kind = e.kind(), error = %e, "history load failed");
        })?;

        let exhausted = page.len() < limit;
        let fresh = state.claim_fresh(page);
        let added = fresh.len();
        let evicted = match direction {
            Direction::Older => {
                for message in fresh.into_iter().rev() {
                    state.messages.push_front(message);
                }
                state.trim_back(limit)
            }
            Direction::Newer => {
                state.messages.extend(fresh);
                state.trim_front(limit)
            }
        };
        if exhausted {
            state.set_has_more(direction, false);
        }
        debug!(
            direction = direction.as_str(),
            added, evicted, exhausted, "history page merged"
        );
        Ok(LoadOutcome::Loaded {
            added,
            evicted,
            exhausted,
        })
    }

    /// Merge `patch` into the message with `id`. Returns whether it was found.
    pub fn update_message(&self, id: &str, patch: MessagePatch) -> bool {
        let mut state = self.state.lock();
        match state.messages.iter_mut().find(|m| m.id.as_str() == id) {
            Some(message) => {
                message.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Remove the message with `id`. Paging flags are left alone.
    pub fn remove_message(&self, id: &str) -> Option<Message> {
        let mut state = self.state.lock();
        let position = state.messages.iter().position(|m| m.id.as_str() == id)?;
        let removed = state.messages.remove(position)?;
        let _ = state.ids.remove(id);
        Some(removed)
    }

    /// Empty the window and reset every cursor and flag.
    ///
    /// Loads in flight when this is called will be dropped on return.
    pub fn clear_messages(&self) {
        let mut state = self.state.lock();
        state.reset();
        debug!(epoch = state.epoch, "window cleared");
    }

    /// Cursor and flag snapshot.
    pub fn pagination(&self) -> PaginationState {
        let state = self.state.lock();
        PaginationState {
            window_size: self.config.window_size,
            load_more_threshold: self.config.load_more_threshold,
            oldest_id: state.edge_id(Direction::Older),
            newest_id: state.edge_id(Direction::Newer),
            has_more_older: state.has_more_older,
            has_more_newer: state.has_more_newer,
            is_loading_older: state.loading_older,
            is_loading_newer: state.loading_newer,
            total_count: state.messages.len(),
        }
    }

    /// Whether a view showing position `index` is close enough to the start to
    /// request the older page.
    pub fn should_load_older(&self, index: usize) -> bool {
        let state = self.state.lock();
        state.has_more_older && !state.loading_older && index < self.config.load_more_threshold
    }

    /// Whether a view showing position `index` is close enough to the end to
    /// request the newer page.
    pub fn should_load_newer(&self, index: usize) -> bool {
        let state = self.state.lock();
        let from_end = state.messages.len().saturating_sub(index.saturating_add(1));
        state.has_more_newer && !state.loading_newer && from_end < self.config.load_more_threshold
    }

    /// Copy of the message with `id`.
    pub fn get(&self, id: &str) -> Option<Message> {
        let state = self.state.lock();
        state.messages.iter().find(|m| m.id.as_str() == id).cloned()
    }

    /// Whether a message with `id` is in the window.
    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().ids.contains(id)
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Whether the window holds no messages.
    pub fn is_empty(&self) -> bool {
        self.state.lock().messages.is_empty()
    }

    /// Ordered snapshot of the window.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.iter().cloned().collect()
    }
}

impl Default for MessageWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parley_core::{MessageStatus, Sender};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn msg(id: &str) -> Message {
        Message::new(id, Sender::new("u1", "Alice"), format!("body {id}"))
    }

    fn msgs(ids: &[&str]) -> Vec<Message> {
        ids.iter().map(|id| msg(id)).collect()
    }

    fn ids(window: &MessageWindow) -> Vec<String> {
        window
            .messages()
            .into_iter()
            .map(|m| m.id.into_inner())
            .collect()
    }

    fn assert_cursors(window: &MessageWindow) {
        let messages = window.messages();
        let page = window.pagination();
        assert!(messages.len() <= page.window_size);
        assert_eq!(page.oldest_id, messages.first().map(|m| m.id.clone()));
        assert_eq!(page.newest_id, messages.last().map(|m| m.id.clone()));
        assert_eq!(page.total_count, messages.len());
    }

    type Page = Result<Vec<Message>, LoadError>;

    #[derive(Default)]
    struct ScriptedLoader {
        older: Mutex<VecDeque<Page>>,
        newer: Mutex<VecDeque<Page>>,
        calls: Mutex<Vec<(Direction, Option<String>, usize)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedLoader {
        fn older(pages: impl IntoIterator<Item = Page>) -> Self {
            Self {
                older: Mutex::new(pages.into_iter().collect()),
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Notify>, older: Page) -> Self {
            Self {
                gate: Some(gate),
                ..Self::older([older])
            }
        }

        fn push_newer(&self, page: Page) {
            self.newer.lock().push_back(page);
        }

        async fn serve(
            &self,
            direction: Direction,
            cursor: Option<&MessageId>,
            limit: usize,
        ) -> Page {
            self.calls
                .lock()
                .push((direction, cursor.map(ToString::to_string), limit));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let queue = match direction {
                Direction::Older => &self.older,
                Direction::Newer => &self.newer,
            };
            queue.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[async_trait]
    impl HistoryLoader for ScriptedLoader {
        async fn load_older(&self, before: Option<&MessageId>, limit: usize) -> Page {
            self.serve(Direction::Older, before, limit).await
        }

        async fn load_newer(&self, after: Option<&MessageId>, limit: usize) -> Page {
            self.serve(Direction::Newer, after, limit).await
        }
    }

    fn window_with(size: usize, loader: &Arc<ScriptedLoader>) -> MessageWindow {
        MessageWindow::new(WindowConfig::new(size, 1)).with_loader(loader.clone())
    }

    async fn wait_for_loading(window: &MessageWindow) {
        while !window.pagination().is_loading_older {
            tokio::task::yield_now().await;
        }
    }

    // ── add ─────────────────────────────────────────────────────────

    #[test]
    fn initial_state() {
        let window = MessageWindow::default();
        let page = window.pagination();
        assert!(window.is_empty());
        assert_eq!(page.window_size, 200);
        assert_eq!(page.load_more_threshold, 10);
        assert!(page.has_more_older);
        assert!(!page.has_more_newer);
        assert_eq!(page.oldest_id, None);
        assert_eq!(page.newest_id, None);
    }

    #[test]
    fn add_message_updates_newest_cursor() {
        let window = MessageWindow::default();
        assert!(window.add_message(msg("a")));
        assert!(window.add_message(msg("b")));
        let page = window.pagination();
        assert_eq!(page.oldest_id.as_deref(), Some("a"));
        assert_eq!(page.newest_id.as_deref(), Some("b"));
        assert!(window.contains("b"));
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let window = MessageWindow::default();
        let _ = window.add_messages(msgs(&["a", "b", "c"]));
        let mut dup = msg("a");
        dup.content = "changed".into();
        assert!(!window.add_message(dup));
        assert_eq!(ids(&window), ["a", "b", "c"]);
        assert_eq!(window.get("a").unwrap().content, "body a");
    }

    #[test]
    fn overflow_evicts_oldest() {
        let window = MessageWindow::new(WindowConfig::new(3, 1));
        let _ = window.add_messages(msgs(&["a", "b", "c"]));
        assert!(window.add_message(msg("d")));
        assert_eq!(ids(&window), ["b", "c", "d"]);
        assert!(window.pagination().has_more_older);
        assert!(!window.contains("a"));
        assert_cursors(&window);
    }

    #[test]
    fn batch_dedups_against_window_and_itself() {
        let window = MessageWindow::default();
        let _ = window.add_messages(msgs(&["a", "b"]));
        let added = window.add_messages(msgs(&["b", "c", "c", "d"]));
        assert_eq!(added, 2);
        assert_eq!(ids(&window), ["a", "b", "c", "d"]);
    }

    #[test]
    fn batch_overflow_scenario() {
        let window = MessageWindow::new(WindowConfig::new(200, 10));
        let first: Vec<Message> = (0..200).map(|i| msg(&format!("m{i}"))).collect();
        assert_eq!(window.add_messages(first), 200);
        let more: Vec<Message> = (200..250).map(|i| msg(&format!("m{i}"))).collect();
        assert_eq!(window.add_messages(more), 50);

        let messages = window.messages();
        assert_eq!(messages.len(), 200);
        assert_eq!(messages[0].id.as_str(), "m50");
        assert_eq!(messages[199].id.as_str(), "m249");
        assert_cursors(&window);
    }

    #[test]
    fn zero_window_size_is_clamped() {
        let window = MessageWindow::new(WindowConfig::new(0, 0));
        let _ = window.add_messages(msgs(&["a", "b"]));
        assert_eq!(ids(&window), ["b"]);
    }

    // ── update / remove / clear ─────────────────────────────────────

    #[test]
    fn update_merges_patch() {
        let window = MessageWindow::default();
        let _ = window.add_messages(msgs(&["a", "b"]));
        assert!(window.update_message("a", MessagePatch::status(MessageStatus::Delivered)));
        assert_eq!(
            window.get("a").unwrap().status,
            Some(MessageStatus::Delivered)
        );
        assert!(!window.update_message("zzz", MessagePatch::status(MessageStatus::Read)));
        assert_eq!(ids(&window), ["a", "b"]);
    }

    #[test]
    fn remove_recomputes_cursors_keeps_flags() {
        let window = MessageWindow::default();
        let _ = window.add_messages(msgs(&["a", "b", "c"]));
        let before = window.pagination();
        let removed = window.remove_message("c").unwrap();
        assert_eq!(removed.id.as_str(), "c");
        assert!(window.remove_message("c").is_none());

        let after = window.pagination();
        assert_eq!(after.newest_id.as_deref(), Some("b"));
        assert_eq!(after.has_more_older, before.has_more_older);
        assert_eq!(after.has_more_newer, before.has_more_newer);
        assert!(!window.contains("c"));
        assert!(window.add_message(msg("c")));
    }

    #[test]
    fn clear_resets_everything() {
        let window = MessageWindow::new(WindowConfig::new(2, 1));
        let _ = window.add_messages(msgs(&["a", "b", "c"]));
        window.clear_messages();
        let page = window.pagination();
        assert!(window.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.oldest_id, None);
        assert!(page.has_more_older);
        assert!(!page.has_more_newer);
        assert!(!page.is_loading_older);
    }

    // ── load triggers ───────────────────────────────────────────────

    #[test]
    fn should_load_uses_threshold_and_flags() {
        let window = MessageWindow::new(WindowConfig::new(50, 5));
        let batch: Vec<Message> = (0..20).map(|i| msg(&format!("m{i}"))).collect();
        let _ = window.add_messages(batch);

        assert!(window.should_load_older(0));
        assert!(window.should_load_older(4));
        assert!(!window.should_load_older(5));
        // at the live edge there is nothing newer to fetch
        assert!(!window.should_load_newer(19));
    }

    #[tokio::test]
    async fn should_load_newer_after_back_trim() {
        let loader = Arc::new(ScriptedLoader::older([Ok(msgs(&["x", "y", "z"]))]));
        let window = MessageWindow::new(WindowConfig::new(3, 1)).with_loader(loader.clone());
        let _ = window.add_messages(msgs(&["a", "b", "c"]));
        let _ = window.load_older_messages().await.unwrap();

        assert!(window.should_load_newer(2));
        assert!(!window.should_load_newer(1));
    }

    // ── loads ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_without_loader_is_skipped() {
        let window = MessageWindow::default();
        assert_matches!(window.load_older_messages().await, Ok(LoadOutcome::Skipped));
        assert_matches!(window.load_newer_messages().await, Ok(LoadOutcome::Skipped));
    }

    #[tokio::test]
    async fn load_older_trims_newest() {
        let loader = Arc::new(ScriptedLoader::older([Ok(msgs(&["x", "y"]))]));
        let window = window_with(3, &loader);
        let _ = window.add_messages(msgs(&["a", "b", "c"]));

        let outcome = window.load_older_messages().await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                added: 2,
                evicted: 2,
                exhausted: true
            }
        );
        assert_eq!(ids(&window), ["x", "y", "a"]);
        let page = window.pagination();
        assert!(page.has_more_newer);
        assert!(!page.has_more_older);
        assert!(!page.is_loading_older);
        assert_cursors(&window);

        let calls = loader.calls.lock().clone();
        assert_eq!(calls, vec![(Direction::Older, Some("a".to_string()), 3)]);
    }

    #[tokio::test]
    async fn load_newer_trims_oldest() {
        let loader = Arc::new(ScriptedLoader::older([Ok(msgs(&["x", "y", "z"]))]));
        loader.push_newer(Ok(msgs(&["a", "b", "c"])));
        loader.push_newer(Ok(msgs(&["d", "e"])));
        let window = window_with(3, &loader);
        let _ = window.add_messages(msgs(&["a", "b", "c"]));

        // full older page: not exhausted, newest three trimmed
        let _ = window.load_older_messages().await.unwrap();
        assert_eq!(ids(&window), ["x", "y", "z"]);
        assert!(window.pagination().has_more_newer);

        let _ = window.load_newer_messages().await.unwrap();
        assert_eq!(ids(&window), ["a", "b", "c"]);

        let outcome = window.load_newer_messages().await.unwrap();
        assert_matches!(outcome, LoadOutcome::Loaded { added: 2, evicted: 2, exhausted: true });
        assert_eq!(ids(&window), ["c", "d", "e"]);
        let page = window.pagination();
        assert!(page.has_more_older);
        assert!(!page.has_more_newer);
        assert_cursors(&window);
    }

    #[tokio::test]
    async fn empty_page_marks_exhausted() {
        let loader = Arc::new(ScriptedLoader::older([Ok(Vec::new())]));
        let window = window_with(3, &loader);
        let _ = window.add_message(msg("a"));

        let outcome = window.load_older_messages().await.unwrap();
        assert_matches!(outcome, LoadOutcome::Loaded { added: 0, exhausted: true, .. });
        assert!(!window.pagination().has_more_older);

        // no further calls once exhausted
        assert_matches!(window.load_older_messages().await, Ok(LoadOutcome::Skipped));
        assert_eq!(loader.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn loader_failure_leaves_window_unchanged() {
        let loader = Arc::new(ScriptedLoader::older([
            Err(LoadError::Unavailable("offline".into())),
            Ok(msgs(&["x"])),
        ]));
        let window = window_with(3, &loader);
        let _ = window.add_messages(msgs(&["a", "b"]));
        let before = window.pagination();

        let err = window.load_older_messages().await.unwrap_err();
        assert_eq!(err, LoadError::Unavailable("offline".into()));
        assert_eq!(ids(&window), ["a", "b"]);
        assert_eq!(window.pagination(), before);

        let _ = window.load_older_messages().await.unwrap();
        assert_eq!(ids(&window), ["x", "a", "b"]);
    }

    #[tokio::test]
    async fn overlapping_load_same_direction_is_skipped() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(gate.clone(), Ok(msgs(&["x"]))));
        let window = window_with(3, &loader);
        let _ = window.add_message(msg("a"));

        let (first, second) = tokio::join!(window.load_older_messages(), async {
            wait_for_loading(&window).await;
            let outcome = window.load_older_messages().await;
            assert!(window.pagination().is_loading_older);
            gate.notify_one();
            outcome
        });
        assert_matches!(first, Ok(LoadOutcome::Loaded { added: 1, .. }));
        assert_matches!(second, Ok(LoadOutcome::Skipped));
        assert_eq!(loader.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn clear_during_load_drops_page() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(gate.clone(), Ok(msgs(&["x", "y"]))));
        let window = window_with(3, &loader);
        let _ = window.add_message(msg("a"));

        let (outcome, ()) = tokio::join!(window.load_older_messages(), async {
            wait_for_loading(&window).await;
            window.clear_messages();
            let _ = window.add_message(msg("fresh"));
            gate.notify_one();
        });
        assert_matches!(outcome, Ok(LoadOutcome::Stale));
        assert_eq!(ids(&window), ["fresh"]);
        let page = window.pagination();
        assert!(page.has_more_older);
        assert!(!page.is_loading_older);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_load_releases_flag() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(gate, Ok(msgs(&["x"]))));
        let window = window_with(3, &loader);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), window.load_older_messages()).await;
        assert!(timed_out.is_err());
        assert!(!window.pagination().is_loading_older);
    }

    #[tokio::test]
    async fn live_adds_continue_during_load() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(gate.clone(), Ok(msgs(&["x"]))));
        let window = window_with(5, &loader);
        let _ = window.add_message(msg("a"));

        let (outcome, ()) = tokio::join!(window.load_older_messages(), async {
            wait_for_loading(&window).await;
            assert!(window.add_message(msg("b")));
            gate.notify_one();
        });
        assert_matches!(outcome, Ok(LoadOutcome::Loaded { added: 1, .. }));
        assert_eq!(ids(&window), ["x", "a", "b"]);
    }

    // ── properties ──────────────────────────────────────────────────

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Batch(Vec<u8>),
        Remove(u8),
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0u8..40).prop_map(Op::Add),
            3 => proptest::collection::vec(0u8..40, 0..12).prop_map(Op::Batch),
            2 => (0u8..40).prop_map(Op::Remove),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_after_every_op(size in 1usize..12, ops in proptest::collection::vec(op(), 0..60)) {
            let window = MessageWindow::new(WindowConfig::new(size, 2));
            for op in ops {
                let before = ids(&window);
                match op {
                    Op::Add(n) => {
                        let id = format!("m{n}");
                        let present = window.contains(&id);
                        let added = window.add_message(msg(&id));
                        prop_assert_eq!(added, !present);
                        if present {
                            prop_assert_eq!(ids(&window), before);
                        }
                    }
                    Op::Batch(ns) => {
                        let _ = window.add_messages(ns.iter().map(|n| msg(&format!("m{n}"))));
                    }
                    Op::Remove(n) => {
                        let _ = window.remove_message(&format!("m{n}"));
                    }
                    Op::Clear => window.clear_messages(),
                }

                let now = ids(&window);
                prop_assert!(now.len() <= size);
                let unique: HashSet<&String> = now.iter().collect();
                prop_assert_eq!(unique.len(), now.len());
                let page = window.pagination();
                prop_assert_eq!(page.oldest_id.map(MessageId::into_inner), now.first().cloned());
                prop_assert_eq!(page.newest_id.map(MessageId::into_inner), now.last().cloned());
            }
        }
    }
}
