use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use sidebar_agents::context::clamp_chars;
use sidebar_agents::{ActiveTab, PageExtractor};
use sidebar_common::{Error, PageContext, Result, TabId};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title regex should compile")
});

static HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>",
    )
    .expect("hidden-content regex should compile")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex should compile"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Reads page context over HTTP from one fixed URL, which plays the active tab.
pub struct HttpPageExtractor {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpPageExtractor {
    pub fn new(client: Client, url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::PageContext(format!("invalid page URL '{url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::PageContext(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }
        Ok(Self {
            client,
            url,
            timeout,
        })
    }
}

#[async_trait]
impl PageExtractor for HttpPageExtractor {
    async fn active_tab(&self) -> Result<ActiveTab> {
        Ok(ActiveTab {
            id: TabId(0),
            url: self.url.to_string(),
        })
    }

    async fn extract(&self, tab: &ActiveTab, max_chars: usize) -> Result<PageContext> {
        debug!(url = %tab.url, "fetching page");
        let fetch = async {
            let response = self
                .client
                .get(&tab.url)
                .send()
                .await
                .map_err(|e| Error::PageContext(format!("could not fetch {}: {e}", tab.url)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Http {
                    status: status.as_u16(),
                    body: format!("fetching {}", tab.url),
                });
            }
            response
                .text()
                .await
                .map_err(|e| Error::PageContext(format!("could not read {}: {e}", tab.url)))
        };

        let html = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let title = page_title(&html).unwrap_or_else(|| tab.url.clone());
        let text = page_text(&html);
        Ok(PageContext::new(
            title,
            tab.url.clone(),
            clamp_chars(&text, max_chars),
        ))
    }
}

fn page_title(html: &str) -> Option<String> {
    let raw = TITLE.captures(html)?.get(1)?.as_str();
    let title = collapse(&decode_entities(raw));
    (!title.is_empty()).then_some(title)
}

/// Visible text of an HTML document on a single line.
fn page_text(html: &str) -> String {
    let visible = HIDDEN.replace_all(html, " ");
    let stripped = TAG.replace_all(&visible, " ");
    collapse(&decode_entities(&stripped))
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
