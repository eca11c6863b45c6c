use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page::PageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One accepted message of the conversation. Never mutated after it is
/// appended to a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: TurnRole,
    pub text: String,
    pub attached_context: Option<PageContext>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, attached_context: Option<PageContext>) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            TurnRole::User,
            text,
            attached_context,
        )
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            TurnRole::Assistant,
            text,
            None,
        )
    }

    /// Build a turn under an id that was already announced to the UI.
    pub fn with_id(
        id: String,
        role: TurnRole,
        text: impl Into<String>,
        attached_context: Option<PageContext>,
    ) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            attached_context,
            timestamp: Utc::now(),
        }
    }
}
