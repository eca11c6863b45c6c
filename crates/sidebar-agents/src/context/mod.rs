use async_trait::async_trait;
use sidebar_common::{Error, PageContext, Result, TabId};
use sidebar_config::ContextSettings;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub mod cache;
pub mod prompt;

pub use cache::ContextCache;
pub use prompt::{TRUNCATION_MARKER, clamp_chars, compose_prompt, truncate_chars};

/// The tab the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTab {
    pub id: TabId,
    pub url: String,
}

/// Host collaborator that reads content out of the inspected page.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn active_tab(&self) -> Result<ActiveTab>;

    /// Extract at most `max_chars` characters of page text.
    async fn extract(&self, tab: &ActiveTab, max_chars: usize) -> Result<PageContext>;
}

/// Serves page context from the cache, extracting on a miss.
pub struct PageContextResolver {
    extractor: Arc<dyn PageExtractor>,
    cache: Mutex<ContextCache>,
    extraction_max_chars: usize,
}

impl PageContextResolver {
    pub fn new(extractor: Arc<dyn PageExtractor>, settings: &ContextSettings) -> Self {
        Self {
            extractor,
            cache: Mutex::new(ContextCache::new(
                settings.cache_ttl(),
                settings.cache_capacity,
            )),
            extraction_max_chars: settings.extraction_max_chars,
        }
    }

    pub async fn resolve(&self) -> Result<PageContext> {
        let tab = self.extractor.active_tab().await?;

        let cached = self.lock_cache()?.get(tab.id, &tab.url);
        if let Some(hit) = cached {
            debug!(tab = %tab.id, url = %tab.url, "page context cache hit");
            return Ok(hit);
        }

        let mut context = self.extractor.extract(&tab, self.extraction_max_chars).await?;
        let clamped_len = clamp_chars(&context.text, self.extraction_max_chars).len();
        context.text.truncate(clamped_len);

        self.lock_cache()?.put(tab.id, &tab.url, context.clone());
        debug!(tab = %tab.id, url = %tab.url, chars = context.text.chars().count(), "page context extracted");
        Ok(context)
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, ContextCache>> {
        self.cache
            .lock()
            .map_err(|_| Error::PageContext("context cache lock poisoned".into()))
    }
}
