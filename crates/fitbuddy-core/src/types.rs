use serde::{Deserialize, Serialize};

/// Languages the bot speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            _ => Err(format!("Unknown language: {s}")),
        }
    }
}

/// Canonical muscle-group tags. One tag per group regardless of the language
/// the user typed; the synonym table lives in [`crate::vocab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Chest,
    Back,
    Biceps,
    Triceps,
    Shoulders,
    Legs,
    Abs,
}

impl MuscleGroup {
    pub const ALL: [MuscleGroup; 7] = [
        MuscleGroup::Chest,
        MuscleGroup::Back,
        MuscleGroup::Biceps,
        MuscleGroup::Triceps,
        MuscleGroup::Shoulders,
        MuscleGroup::Legs,
        MuscleGroup::Abs,
    ];

    /// The tag stored in the exercise catalog.
    pub fn tag(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Biceps => "biceps",
            MuscleGroup::Triceps => "triceps",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Abs => "abs",
        }
    }

    /// Display name in the given language, for menus and captions.
    pub fn display_name(&self, lang: Language) -> &'static str {
        match (self, lang) {
            (MuscleGroup::Chest, Language::En) => "Chest",
            (MuscleGroup::Chest, Language::Es) => "Pecho",
            (MuscleGroup::Back, Language::En) => "Back",
            (MuscleGroup::Back, Language::Es) => "Espalda",
            (MuscleGroup::Biceps, Language::En) => "Biceps",
            (MuscleGroup::Biceps, Language::Es) => "Bíceps",
            (MuscleGroup::Triceps, Language::En) => "Triceps",
            (MuscleGroup::Triceps, Language::Es) => "Tríceps",
            (MuscleGroup::Shoulders, Language::En) => "Shoulders",
            (MuscleGroup::Shoulders, Language::Es) => "Hombros",
            (MuscleGroup::Legs, Language::En) => "Legs",
            (MuscleGroup::Legs, Language::Es) => "Piernas",
            (MuscleGroup::Abs, Language::En) => "Abs",
            (MuscleGroup::Abs, Language::Es) => "Abdominales",
        }
    }
}

impl std::fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for MuscleGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.to_lowercase();
        MuscleGroup::ALL
            .into_iter()
            .find(|m| m.tag() == tag)
            .ok_or_else(|| format!("Unknown muscle group: {s}"))
    }
}

/// What kind of inbound event the webhook carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A plain text message.
    Text { body: String },
    /// A tap on an interactive reply button.
    ButtonChoice { id: String },
    /// Anything we do not handle (media, reactions, unknown shapes).
    Unsupported,
}

/// Canonical form of one inbound webhook event, produced by the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub user_id: String,
    pub kind: EventKind,
}

impl NormalizedEvent {
    pub fn text(user_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::Text { body: body.into() },
        }
    }

    pub fn button(user_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::ButtonChoice { id: id.into() },
        }
    }

    pub fn unsupported(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: EventKind::Unsupported,
        }
    }
}

/// One interactive reply button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub label: String,
}

impl Button {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Outcome of one exercise dispatch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Unique records selected for sending after dedup.
    pub requested: usize,
    pub sent: usize,
    pub failed: usize,
    /// True when the batch stopped early because the session was cleared.
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_round_trip() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!("ES".parse::<Language>().unwrap(), Language::Es);
        assert_eq!(Language::Es.to_string(), "es");
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_muscle_group_tag_round_trip() {
        for group in MuscleGroup::ALL {
            assert_eq!(group.tag().parse::<MuscleGroup>().unwrap(), group);
        }
        assert_eq!("CHEST".parse::<MuscleGroup>().unwrap(), MuscleGroup::Chest);
        assert!("forearms".parse::<MuscleGroup>().is_err());
    }

    #[test]
    fn test_muscle_group_display_names() {
        assert_eq!(MuscleGroup::Legs.display_name(Language::En), "Legs");
        assert_eq!(MuscleGroup::Legs.display_name(Language::Es), "Piernas");
        assert_eq!(MuscleGroup::Biceps.display_name(Language::Es), "Bíceps");
    }

    #[test]
    fn test_normalized_event_constructors() {
        let e = NormalizedEvent::text("15551234", "hello");
        assert_eq!(e.user_id, "15551234");
        assert_eq!(
            e.kind,
            EventKind::Text {
                body: "hello".into()
            }
        );

        let b = NormalizedEvent::button("15551234", "lang_en");
        assert_eq!(b.kind, EventKind::ButtonChoice { id: "lang_en".into() });
    }
}
