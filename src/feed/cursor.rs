//! Content cursor service
//!
//! Each `(connection, topic)` pair owns a cursor. A fresh cursor walks the
//! topic's templates in catalog order, so every connection sees the same
//! opening feed. Once the pool is exhausted the cursor keeps producing items
//! from randomly chosen templates, rejecting any id it has already handed to
//! that connection.
//!
//! Locking: the cursor map lock is held only to find or create an entry.
//! A batch then runs under that entry's own lock, so batches for different
//! keys proceed in parallel while batches for the same key are serialized.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::catalog::{Template, TemplateStore};
use crate::feed::item::{ContentItem, IdSource, RandomHexIds};

/// Attempts at a fresh id once the template pool is exhausted.
pub const MAX_UNIQUE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    connection_id: String,
    topic: String,
}

impl CursorKey {
    fn new(connection_id: &str, topic: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            topic: topic.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct CursorState {
    /// Next template to walk; after exhaustion, the number of items emitted.
    template_index: usize,
    seen_ids: HashSet<String>,
}

impl CursorState {
    fn reset(&mut self) {
        self.template_index = 0;
        self.seen_ids.clear();
    }
}

type SharedCursor = Arc<Mutex<CursorState>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CursorService {
    store: Arc<dyn TemplateStore>,
    ids: Box<dyn IdSource>,
    cursors: Mutex<HashMap<CursorKey, SharedCursor>>,
}

impl CursorService {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self::with_id_source(store, RandomHexIds)
    }

    pub fn with_id_source(store: Arc<dyn TemplateStore>, ids: impl IdSource + 'static) -> Self {
        Self {
            store,
            ids: Box::new(ids),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Returns up to `count` items for `connection_id` on `topic`, advancing its cursor.
    ///
    /// A topic without templates yields an empty batch and leaves no cursor
    /// behind. A slot whose unique-id attempts all collide is skipped, so the
    /// batch may be shorter than `count`.
    pub fn next_batch(&self, connection_id: &str, topic: &str, count: usize) -> Vec<ContentItem> {
        let templates = self.store.templates_for(topic);
        if templates.is_empty() || count == 0 {
            return Vec::new();
        }

        let cursor = self.cursor(CursorKey::new(connection_id, topic));
        let mut state = lock(&cursor);
        let mut rng = rand::thread_rng();

        let batch: Vec<ContentItem> = (0..count)
            .filter_map(|_| self.next_item(&mut *state, templates, &mut rng))
            .collect();

        if batch.len() < count {
            debug!(
                topic,
                connection = connection_id,
                requested = count,
                produced = batch.len(),
                "short batch"
            );
        }
        batch
    }

    fn next_item<R: Rng>(
        &self,
        state: &mut CursorState,
        templates: &[Template],
        rng: &mut R,
    ) -> Option<ContentItem> {
        if let Some(template) = templates.get(state.template_index) {
            let item = ContentItem::materialize(template, self.ids.next_id(), rng);
            state.seen_ids.insert(item.id.clone());
            state.template_index += 1;
            return Some(item);
        }

        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let template = templates.choose(rng)?;
            let id = self.ids.next_id();
            if state.seen_ids.contains(&id) {
                continue;
            }
            let item = ContentItem::materialize(template, id, rng);
            state.seen_ids.insert(item.id.clone());
            state.template_index += 1;
            return Some(item);
        }

        warn!(
            topic = %templates[0].topic,
            attempts = MAX_UNIQUE_ATTEMPTS,
            "could not generate an unseen item id"
        );
        None
    }

    fn cursor(&self, key: CursorKey) -> SharedCursor {
        lock(&self.cursors).entry(key).or_default().clone()
    }

    /// Rewinds the cursor to the first template and forgets every id it handed out.
    pub fn reset_cursor(&self, connection_id: &str, topic: &str) {
        let key = CursorKey::new(connection_id, topic);
        let cursor = lock(&self.cursors).get(&key).cloned();
        if let Some(cursor) = cursor {
            lock(&cursor).reset();
            debug!(topic, connection = connection_id, "cursor reset");
        }
    }

    /// Drops every cursor held by `connection_id`.
    pub fn forget_connection(&self, connection_id: &str) {
        let mut cursors = lock(&self.cursors);
        let before = cursors.len();
        cursors.retain(|key, _| key.connection_id != connection_id);
        let dropped = before - cursors.len();
        if dropped > 0 {
            debug!(connection = connection_id, dropped, "forgot cursors");
        }
    }

    /// Current position of a cursor, `None` if it was never used.
    pub fn cursor_position(&self, connection_id: &str, topic: &str) -> Option<usize> {
        let key = CursorKey::new(connection_id, topic);
        let cursor = lock(&self.cursors).get(&key).cloned()?;
        let position = lock(&cursor).template_index;
        Some(position)
    }

    pub fn count_templates(&self, topic: &str) -> usize {
        self.store.templates_for(topic).len()
    }

    pub fn topics(&self) -> Vec<String> {
        self.store.topics()
    }
}

impl std::fmt::Debug for CursorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorService")
            .field("cursors", &lock(&self.cursors).len())
            .finish()
    }
}
