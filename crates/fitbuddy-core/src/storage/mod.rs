//! SQLite persistence for users, login tokens, exercises and workout data.
//!
//! One [`Database`] handle implements every durable collaborator trait the
//! core depends on, so production wiring is a single `Arc<Database>` while
//! tests swap in the in-memory fakes next to each trait.

mod schema;

pub use schema::SCHEMA;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::catalog::{ExerciseCatalog, ExerciseRecord};
use crate::directory::{UserDirectory, UserProfile};
use crate::error::StorageError;
use crate::token::{LoginToken, RejectReason, TokenStore};
use crate::types::{Language, MuscleGroup};

/// Thread-safe database handle.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Exercises ====================

    pub fn insert_exercise(
        &self,
        name_en: &str,
        name_es: &str,
        equipment: &str,
        muscle_group: MuscleGroup,
        image_url: &str,
        animation_url: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO exercises (name_en, name_es, equipment, muscle_group, image_url, animation_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![name_en, name_es, equipment, muscle_group.tag(), image_url, animation_url],
        )?;
        Ok(())
    }

    /// Seed the demo exercise rows used by a fresh install.
    pub fn seed_demo_exercises(&self) -> Result<usize, StorageError> {
        let rows: &[(&str, &str, &str, MuscleGroup)] = &[
            ("Barbell Bench Press", "Press de banca con barra", "Barbell", MuscleGroup::Chest),
            ("Dumbbell Bench Press", "Press de banca con mancuernas", "Dumbbells", MuscleGroup::Chest),
            ("Incline Dumbbell Bench Press", "Press inclinado con mancuernas", "Dumbbells", MuscleGroup::Chest),
            ("Dumbbell Chest Fly", "Aperturas de pecho con mancuernas", "Dumbbells", MuscleGroup::Chest),
            ("Cable Crossover", "Cruce de cables", "Cable Machine", MuscleGroup::Chest),
            ("Push-ups", "Flexiones", "Bodyweight", MuscleGroup::Chest),
            ("Dips", "Fondos en paralelas", "Parallel Bars", MuscleGroup::Chest),
            ("Pull-ups", "Dominadas", "Bodyweight", MuscleGroup::Back),
            ("Barbell Row", "Remo con barra", "Barbell", MuscleGroup::Back),
            ("Lat Pulldown", "Jalón al pecho", "Cable Machine", MuscleGroup::Back),
            ("Barbell Curl", "Curl con barra", "Barbell", MuscleGroup::Biceps),
            ("Hammer Curl", "Curl martillo", "Dumbbells", MuscleGroup::Biceps),
            ("Triceps Pushdown", "Extensión de tríceps en polea", "Cable Machine", MuscleGroup::Triceps),
            ("Overhead Press", "Press militar", "Barbell", MuscleGroup::Shoulders),
            ("Lateral Raise", "Elevaciones laterales", "Dumbbells", MuscleGroup::Shoulders),
            ("Back Squat", "Sentadilla con barra", "Barbell", MuscleGroup::Legs),
            ("Leg Press", "Prensa de piernas", "Machine", MuscleGroup::Legs),
            ("Plank", "Plancha", "Bodyweight", MuscleGroup::Abs),
            ("Crunches", "Abdominales", "Bodyweight", MuscleGroup::Abs),
        ];

        for (name_en, name_es, equipment, group) in rows {
            let slug = name_en.to_lowercase().replace(' ', "-");
            let image_url = format!("https://media.fitbuddy.app/exercises/{slug}.gif");
            self.insert_exercise(name_en, name_es, equipment, *group, &image_url, None)?;
        }
        Ok(rows.len())
    }

    // ==================== Workout read model ====================

    pub fn workout_summary(&self, user_id: &str) -> Result<WorkoutSummary, StorageError> {
        let conn = self.conn.lock().unwrap();
        let summary = conn.query_row(
            "SELECT COUNT(DISTINCT w.id),
                    COUNT(we.id),
                    COALESCE(SUM(we.sets * we.reps), 0)
             FROM workouts w
             LEFT JOIN workout_exercises we ON we.workout_id = w.id
             WHERE w.user_id = ?1",
            params![user_id],
            |row| {
                Ok(WorkoutSummary {
                    total_workouts: row.get(0)?,
                    total_exercises: row.get(1)?,
                    total_reps: row.get(2)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Workout rows from the last 30 days, newest first.
    pub fn recent_workouts(&self, user_id: &str, limit: u32) -> Result<Vec<WorkoutRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT w.workout_date, w.muscle_group, we.exercise_name, we.sets, we.reps, we.weight
             FROM workouts w
             JOIN workout_exercises we ON we.workout_id = w.id
             WHERE w.user_id = ?1 AND w.workout_date >= date('now', '-30 days')
             ORDER BY w.workout_date DESC, we.order_index
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(WorkoutRow {
                    date: row.get(0)?,
                    muscle_group: row.get(1)?,
                    exercise: row.get(2)?,
                    sets: row.get(3)?,
                    reps: row.get(4)?,
                    weight: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn personal_records(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<PersonalRecord>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT exercise_name, weight, reps, date_achieved
             FROM personal_records
             WHERE user_id = ?1
             ORDER BY date_achieved DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(PersonalRecord {
                    exercise: row.get(0)?,
                    weight: row.get(1)?,
                    reps: row.get(2)?,
                    date_achieved: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record a workout with its exercise lines. Used by the web surface and
    /// by seeding; the chat flow itself never writes workout data.
    pub fn add_workout(
        &self,
        user_id: &str,
        date: &str,
        muscle_group: MuscleGroup,
        exercises: &[(String, u32, u32, f64)],
    ) -> Result<i64, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO workouts (user_id, workout_date, muscle_group) VALUES (?1, ?2, ?3)",
            params![user_id, date, muscle_group.tag()],
        )?;
        let workout_id = conn.last_insert_rowid();
        for (index, (name, sets, reps, weight)) in exercises.iter().enumerate() {
            conn.execute(
                "INSERT INTO workout_exercises (workout_id, exercise_name, sets, reps, weight, order_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![workout_id, name, sets, reps, weight, index as i64],
            )?;
        }
        Ok(workout_id)
    }
}

/// Aggregate dashboard numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub total_workouts: i64,
    pub total_exercises: i64,
    pub total_reps: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRow {
    pub date: String,
    pub muscle_group: String,
    pub exercise: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub exercise: String,
    pub weight: f64,
    pub reps: i64,
    pub date_achieved: String,
}

// ==================== Collaborator trait impls ====================

impl UserDirectory for Database {
    fn get(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT wa_id, name, email, registered, language FROM users WHERE wa_id = ?1",
                params![user_id],
                |row| {
                    let language: Option<String> = row.get(4)?;
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        registered: row.get(3)?,
                        language: language.and_then(|l| l.parse::<Language>().ok()),
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    fn upsert_language(&self, user_id: &str, language: Language) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (wa_id, language) VALUES (?1, ?2)
             ON CONFLICT(wa_id) DO UPDATE SET language = excluded.language",
            params![user_id, language.code()],
        )?;
        Ok(())
    }

    fn upsert_registration(
        &self,
        user_id: &str,
        name: &str,
        email: &str,
        language: Language,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (wa_id, name, email, registered, language)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(wa_id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 registered = 1,
                 language = excluded.language",
            params![user_id, name, email, language.code()],
        )?;
        Ok(())
    }
}

impl ExerciseCatalog for Database {
    fn find_by_muscle_group(
        &self,
        group: MuscleGroup,
    ) -> Result<Vec<ExerciseRecord>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name_en, name_es, equipment, image_url, animation_url
             FROM exercises
             WHERE LOWER(muscle_group) = LOWER(?1)
             ORDER BY name_en",
        )?;
        let rows = stmt
            .query_map(params![group.tag()], |row| {
                Ok(ExerciseRecord {
                    name_en: row.get(0)?,
                    name_es: row.get(1)?,
                    equipment: row.get(2)?,
                    media_url: row.get(3)?,
                    animation_url: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl TokenStore for Database {
    fn insert(&self, token: &LoginToken) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO login_tokens (token, wa_id, issued_at, expires_at, used)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.token,
                token.subject_id,
                token.issued_at,
                token.expires_at,
                token.used
            ],
        )?;
        Ok(())
    }

    fn consume(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Result<String, RejectReason>, StorageError> {
        // The connection mutex makes lookup + flip one atomic step; the
        // conditional UPDATE guards the invariant even if that ever changes.
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT wa_id, expires_at, used FROM login_tokens WHERE token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((subject_id, expires_at, used)) = row else {
            return Ok(Err(RejectReason::NotFound));
        };
        if used {
            return Ok(Err(RejectReason::AlreadyUsed));
        }
        if now > expires_at {
            return Ok(Err(RejectReason::Expired));
        }

        let updated = conn.execute(
            "UPDATE login_tokens SET used = 1 WHERE token = ?1 AND used = 0",
            params![token],
        )?;
        if updated == 0 {
            return Ok(Err(RejectReason::AlreadyUsed));
        }
        Ok(Ok(subject_id))
    }

    fn purge_stale(&self, now: i64, used_retention_secs: i64) -> Result<usize, StorageError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM login_tokens
             WHERE expires_at < ?1 OR (used = 1 AND issued_at < ?2)",
            params![now, now - used_retention_secs],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenBridge, TOKEN_TTL_SECS};

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_open_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path().join("test.db")).unwrap();
        assert!(UserDirectory::get(&db, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_directory_language_then_registration() {
        let db = db();
        db.upsert_language("15551234", Language::Es).unwrap();

        let profile = UserDirectory::get(&db, "15551234").unwrap().unwrap();
        assert_eq!(profile.language, Some(Language::Es));
        assert!(!profile.registered);
        assert!(profile.name.is_none());

        db.upsert_registration("15551234", "Alex", "a@x.com", Language::Es)
            .unwrap();
        let profile = UserDirectory::get(&db, "15551234").unwrap().unwrap();
        assert!(profile.registered);
        assert_eq!(profile.name.as_deref(), Some("Alex"));
        assert_eq!(profile.email.as_deref(), Some("a@x.com"));
        assert!(profile.is_returning());
    }

    #[test]
    fn test_language_upsert_preserves_registration() {
        let db = db();
        db.upsert_registration("u1", "Alex", "a@x.com", Language::En)
            .unwrap();
        db.upsert_language("u1", Language::Es).unwrap();

        let profile = UserDirectory::get(&db, "u1").unwrap().unwrap();
        assert!(profile.registered);
        assert_eq!(profile.name.as_deref(), Some("Alex"));
        assert_eq!(profile.language, Some(Language::Es));
    }

    #[test]
    fn test_catalog_case_insensitive_lookup() {
        let db = db();
        db.insert_exercise(
            "Push-ups",
            "Flexiones",
            "Bodyweight",
            MuscleGroup::Chest,
            "https://cdn.example/pushups.gif",
            None,
        )
        .unwrap();

        // Tag stored as "chest"; stored-case variations still match.
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO exercises (name_en, name_es, equipment, muscle_group, image_url)
                 VALUES ('Bench Press', 'Press de banca', 'Barbell', 'Chest', 'https://cdn.example/bench.gif')",
                [],
            )
            .unwrap();
        }

        let records = db.find_by_muscle_group(MuscleGroup::Chest).unwrap();
        assert_eq!(records.len(), 2);
        assert!(db.find_by_muscle_group(MuscleGroup::Legs).unwrap().is_empty());
    }

    #[test]
    fn test_token_bridge_against_sqlite() {
        let db = db();
        let bridge = TokenBridge::new(Arc::new(db.clone()));

        let token = bridge.issue_at("15551234", 1_000).unwrap();
        assert_eq!(bridge.redeem_at(&token, 1_010).unwrap(), "15551234");
        assert!(matches!(
            bridge.redeem_at(&token, 1_020),
            Err(crate::token::RedeemError::Rejected(RejectReason::AlreadyUsed))
        ));
    }

    #[test]
    fn test_token_expiry_and_purge_in_sqlite() {
        let db = db();
        let bridge = TokenBridge::new(Arc::new(db.clone()));

        let token = bridge.issue_at("u1", 1_000).unwrap();
        assert!(matches!(
            bridge.redeem_at(&token, 1_000 + TOKEN_TTL_SECS + 1),
            Err(crate::token::RedeemError::Rejected(RejectReason::Expired))
        ));

        // Issuing later purges the expired row.
        let _ = bridge.issue_at("u2", 1_000_000).unwrap();
        assert!(matches!(
            bridge.redeem_at(&token, 1_000_000),
            Err(crate::token::RedeemError::Rejected(RejectReason::NotFound))
        ));
    }

    #[test]
    fn test_workout_read_model() {
        let db = db();
        db.add_workout(
            "u1",
            &chrono::Utc::now().format("%Y-%m-%d").to_string(),
            MuscleGroup::Chest,
            &[
                ("Bench Press".into(), 3, 10, 60.0),
                ("Push-ups".into(), 3, 15, 0.0),
            ],
        )
        .unwrap();

        let summary = db.workout_summary("u1").unwrap();
        assert_eq!(summary.total_workouts, 1);
        assert_eq!(summary.total_exercises, 2);
        assert_eq!(summary.total_reps, 3 * 10 + 3 * 15);

        let rows = db.recent_workouts("u1", 50).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].exercise, "Bench Press");

        // Other users see nothing.
        assert_eq!(db.workout_summary("u2").unwrap(), WorkoutSummary::default());
    }

    #[test]
    fn test_personal_records_query() {
        let db = db();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO personal_records (user_id, exercise_name, weight, reps, date_achieved)
                 VALUES ('u1', 'Bench Press', 80.0, 5, '2026-07-01')",
                [],
            )
            .unwrap();
        }
        let records = db.personal_records("u1", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exercise, "Bench Press");
        assert_eq!(records[0].weight, 80.0);
    }

    #[test]
    fn test_seed_demo_exercises() {
        let db = db();
        let count = db.seed_demo_exercises().unwrap();
        assert!(count > 0);
        assert!(!db.find_by_muscle_group(MuscleGroup::Chest).unwrap().is_empty());
        assert!(!db.find_by_muscle_group(MuscleGroup::Abs).unwrap().is_empty());
    }
}
