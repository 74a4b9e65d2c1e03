/// Database schema. Applied idempotently on open.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    wa_id       TEXT PRIMARY KEY,
    name        TEXT,
    email       TEXT,
    registered  INTEGER NOT NULL DEFAULT 0,
    language    TEXT
);

CREATE TABLE IF NOT EXISTS login_tokens (
    token       TEXT PRIMARY KEY,
    wa_id       TEXT NOT NULL,
    issued_at   INTEGER NOT NULL,
    expires_at  INTEGER NOT NULL,
    used        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS exercises (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name_en       TEXT NOT NULL,
    name_es       TEXT NOT NULL,
    equipment     TEXT NOT NULL DEFAULT '',
    muscle_group  TEXT NOT NULL,
    image_url     TEXT NOT NULL DEFAULT '',
    animation_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_exercises_muscle_group
    ON exercises (muscle_group COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS workouts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       TEXT NOT NULL,
    workout_date  TEXT NOT NULL,
    muscle_group  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workout_exercises (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_id    INTEGER NOT NULL REFERENCES workouts(id),
    exercise_name TEXT NOT NULL,
    sets          INTEGER NOT NULL,
    reps          INTEGER NOT NULL,
    weight        REAL NOT NULL DEFAULT 0,
    order_index   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS personal_records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       TEXT NOT NULL,
    exercise_name TEXT NOT NULL,
    weight        REAL NOT NULL,
    reps          INTEGER NOT NULL,
    date_achieved TEXT NOT NULL
);
"#;
