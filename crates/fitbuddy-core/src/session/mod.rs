pub mod memory_store;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::types::{Language, MuscleGroup};

/// The discrete step of the conversation a user is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingLanguage,
    AwaitingRegistrationChoice,
    AwaitingName,
    AwaitingEmail,
    AwaitingMenuChoice,
    AwaitingMuscleGroup,
    /// No specific expectation; any input gets re-oriented.
    Idle,
}

/// Per-user conversation state. Fields not relevant to the current phase may
/// be stale; the state machine ignores them rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub phase: Phase,
    pub language: Option<Language>,
    pub draft_name: Option<String>,
    pub selected_muscle_group: Option<MuscleGroup>,
}

impl ConversationState {
    pub fn new(user_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            user_id: user_id.into(),
            phase,
            language: None,
            draft_name: None,
            selected_muscle_group: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Fresh state for a user whose directory profile carries a language but
    /// who has no live conversation (e.g. after a process restart).
    pub fn idle(user_id: impl Into<String>, language: Option<Language>) -> Self {
        Self {
            user_id: user_id.into(),
            phase: Phase::Idle,
            language,
            draft_name: None,
            selected_muscle_group: None,
        }
    }
}
