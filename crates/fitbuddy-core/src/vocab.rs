//! Keyword sets and the bilingual muscle-group synonym table.
//!
//! All matching is case-insensitive on the trimmed input. Keeping every
//! keyword in one place means new phrases are additions to a table, not new
//! branches in the state machine.

use crate::types::MuscleGroup;

/// Greetings that restart the conversation from any phase.
pub const GREETINGS: &[&str] = &["hi", "hello", "hola", "hey"];

/// Keywords that trigger the web dashboard hand-off from any phase.
pub const TRACKER_KEYWORDS: &[&str] =
    &["tracker", "web", "website", "dashboard", "panel", "rastreador"];

/// Keywords that end the chat session from any phase.
pub const LOGOUT_KEYWORDS: &[&str] = &["logout", "log out", "salir"];

fn matches_any(text: &str, set: &[&str]) -> bool {
    let t = text.trim().to_lowercase();
    set.contains(&t.as_str())
}

pub fn is_greeting(text: &str) -> bool {
    matches_any(text, GREETINGS)
}

pub fn is_tracker_keyword(text: &str) -> bool {
    matches_any(text, TRACKER_KEYWORDS)
}

pub fn is_logout_keyword(text: &str) -> bool {
    matches_any(text, LOGOUT_KEYWORDS)
}

/// Resolve free text to a canonical muscle-group tag.
///
/// Synonyms from both languages are accepted regardless of the session
/// language; accented and singular/plural Spanish variants map to the same
/// tag as their English counterparts.
pub fn match_muscle_group(text: &str) -> Option<MuscleGroup> {
    let t = text.trim().to_lowercase();
    let synonyms: &[(&str, MuscleGroup)] = &[
        ("chest", MuscleGroup::Chest),
        ("pecho", MuscleGroup::Chest),
        ("back", MuscleGroup::Back),
        ("espalda", MuscleGroup::Back),
        ("biceps", MuscleGroup::Biceps),
        ("bíceps", MuscleGroup::Biceps),
        ("triceps", MuscleGroup::Triceps),
        ("tríceps", MuscleGroup::Triceps),
        ("shoulders", MuscleGroup::Shoulders),
        ("hombros", MuscleGroup::Shoulders),
        ("legs", MuscleGroup::Legs),
        ("piernas", MuscleGroup::Legs),
        ("pierna", MuscleGroup::Legs),
        ("abs", MuscleGroup::Abs),
        ("abdominales", MuscleGroup::Abs),
        ("abdomen", MuscleGroup::Abs),
    ];
    synonyms
        .iter()
        .find(|(syn, _)| *syn == t)
        .map(|(_, group)| *group)
}
