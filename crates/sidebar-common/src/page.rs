use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser tab identifier as handed out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text and metadata extracted from the page open in a tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub title: String,
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub selected_text: String,
}

impl PageContext {
    pub fn new(title: impl Into<String>, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            text: text.into(),
            selected_text: String::new(),
        }
    }

    /// Whether there is any page body worth sending to a model.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
