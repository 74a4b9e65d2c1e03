use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::Language;

/// A user's durable profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub registered: bool,
    pub language: Option<Language>,
}

impl UserProfile {
    /// A returning user: has both a language preference and a completed
    /// registration. Drives the greeting branch of the state machine.
    pub fn is_returning(&self) -> bool {
        self.registered && self.language.is_some()
    }
}

/// Read/write access to the durable user directory.
///
/// Writes are deliberately narrow: the chat flow only ever records a language
/// choice or a completed registration, so partial upserts can't clobber
/// fields they didn't mean to touch.
pub trait UserDirectory: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError>;

    /// Record the user's language choice, creating the row if needed.
    fn upsert_language(&self, user_id: &str, language: Language) -> Result<(), StorageError>;

    /// Record a completed registration.
    fn upsert_registration(
        &self,
        user_id: &str,
        name: &str,
        email: &str,
        language: Language,
    ) -> Result<(), StorageError>;
}
