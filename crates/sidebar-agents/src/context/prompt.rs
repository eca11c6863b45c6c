use sidebar_common::PageContext;
use std::borrow::Cow;

/// Appended to page text that was cut at the character limit.
pub const TRUNCATION_MARKER: &str = "...";

/// First `max_chars` characters of `text` plus [`TRUNCATION_MARKER`], or
/// `text` unchanged when it fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

/// Cut without a marker; used to clamp what an extractor hands back.
pub fn clamp_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// The user message actually sent to a model, with the page context block
/// prefixed when a page with text is attached.
pub fn compose_prompt(user_text: &str, page: Option<&PageContext>, max_chars: usize) -> String {
    match page {
        Some(page) if page.has_text() => format!(
            "Context from page \"{}\" ({}):\n\n{}\n\n---\n\nUser question: {}",
            page.title,
            page.url,
            truncate_chars(&page.text, max_chars),
            user_text
        ),
        _ => user_text.to_string(),
    }
}
