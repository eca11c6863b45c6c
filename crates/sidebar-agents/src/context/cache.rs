use sidebar_common::{PageContext, TabId};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type CacheKey = (TabId, String);

struct CacheEntry {
    context: PageContext,
    stored_at: Instant,
}

/// Bounded cache of extracted page contexts keyed by `(tab, url)`.
///
/// Freshness is checked lazily on read; stale entries stay resident until
/// overwritten or pushed out by capacity. Eviction follows insertion order,
/// not recency of use.
pub struct ContextCache {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
    ttl: Duration,
    capacity: usize,
}

impl ContextCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, tab: TabId, url: &str) -> Option<PageContext> {
        let entry = self.entries.get(&(tab, url.to_string()))?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.context.clone())
        } else {
            None
        }
    }

    /// Store `context` with the current time. Overwriting a key refreshes its
    /// timestamp but keeps its original insertion position.
    pub fn put(&mut self, tab: TabId, url: &str, context: PageContext) {
        let key = (tab, url.to_string());
        let entry = CacheEntry {
            context,
            stored_at: Instant::now(),
        };

        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }

        if self.entries.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            debug!(tab = %oldest.0, url = %oldest.1, "evicting cached page context");
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
