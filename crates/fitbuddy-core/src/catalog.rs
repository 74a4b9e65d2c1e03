use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::{Language, MuscleGroup};

/// One exercise row from the catalog. Read-only from the core's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub name_en: String,
    pub name_es: String,
    pub equipment: String,
    pub media_url: String,
    pub animation_url: Option<String>,
}

impl ExerciseRecord {
    pub fn name(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.name_en,
            Language::Es => &self.name_es,
        }
    }
}

/// Read access to the durable exercise catalog.
pub trait ExerciseCatalog: Send + Sync {
    /// All records tagged with the canonical muscle group, case-insensitive
    /// on the stored tag.
    fn find_by_muscle_group(&self, group: MuscleGroup)
        -> Result<Vec<ExerciseRecord>, StorageError>;
}
