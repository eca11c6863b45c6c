use async_trait::async_trait;
use sidebar_common::{PageContext, Result};
use std::sync::Arc;

/// Phrases that mark a prompt as a request to summarize the attached page.
const SUMMARY_KEYWORDS: &[&str] = &[
    "summarize",
    "summary",
    "tldr",
    "tl;dr",
    "key points",
    "main points",
];

const SUMMARY_DISPLAY_PREFIX: &str = "Summary:\n\n";

/// A dedicated summarization capability (e.g. the host's built-in summarizer).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Where a turn should be sent.
pub enum Route<'a> {
    Summarize {
        summarizer: Arc<dyn Summarizer>,
        page: &'a PageContext,
    },
    Complete,
}

impl Route<'_> {
    pub fn is_summarize(&self) -> bool {
        matches!(self, Route::Summarize { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummarizationRouter;

impl SummarizationRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn should_summarize(&self, prompt: &str) -> bool {
        let prompt = prompt.to_lowercase();
        SUMMARY_KEYWORDS.iter().any(|keyword| prompt.contains(keyword))
    }

    /// Summarize only when the prompt asks for it, a summarizer exists and a
    /// page with text is attached; everything else goes to completion.
    pub fn route<'a>(
        &self,
        prompt: &str,
        page: Option<&'a PageContext>,
        summarizer: Option<&Arc<dyn Summarizer>>,
    ) -> Route<'a> {
        match (page, summarizer) {
            (Some(page), Some(summarizer)) if page.has_text() && self.should_summarize(prompt) => {
                Route::Summarize {
                    summarizer: summarizer.clone(),
                    page,
                }
            }
            _ => Route::Complete,
        }
    }
}

/// How a stored summary is presented to the user.
pub fn display_summary(summary: &str) -> String {
    format!("{SUMMARY_DISPLAY_PREFIX}{summary}")
}
