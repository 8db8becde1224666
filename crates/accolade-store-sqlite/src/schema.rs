//! SQL schemas for the two SQLite stores.
//!
//! Executed once at connection startup. Both are idempotent thanks to
//! `IF NOT EXISTS`; future migrations will be gated on `user_version`.

/// Detail documents. Structured fields are JSON columns so that the document
/// shape can vary by achievement type.
pub const DETAIL_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS achievement_details (
    detail_id        TEXT PRIMARY KEY,
    student_id       TEXT NOT NULL,
    achievement_type TEXT NOT NULL,   -- tag of the AchievementDetails variant
    title            TEXT NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    details_json     TEXT NOT NULL,   -- JSON payload (inner data only)
    attachments      TEXT NOT NULL DEFAULT '[]',
    tags             TEXT NOT NULL DEFAULT '[]',
    points           INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    deleted_at       TEXT             -- NULL while visible
);

CREATE INDEX IF NOT EXISTS details_student_idx ON achievement_details(student_id);
CREATE INDEX IF NOT EXISTS details_created_idx ON achievement_details(created_at);

PRAGMA user_version = 1;
";

/// Reference rows plus the student/lecturer directory.
pub const REFERENCE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS lecturers (
    lecturer_id     TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL UNIQUE,
    lecturer_number TEXT NOT NULL,
    department      TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL UNIQUE,
    student_number TEXT NOT NULL,
    program_study  TEXT NOT NULL DEFAULT '',
    academic_year  TEXT NOT NULL DEFAULT '',
    advisor_id     TEXT REFERENCES lecturers(lecturer_id)
);

-- Status only ever moves through conditional UPDATEs keyed on the
-- current status.
CREATE TABLE IF NOT EXISTS achievement_references (
    reference_id   TEXT PRIMARY KEY,
    student_id     TEXT NOT NULL,
    detail_id      TEXT NOT NULL UNIQUE,
    status         TEXT NOT NULL DEFAULT 'draft'
                   CHECK (status IN ('draft', 'submitted', 'verified', 'rejected', 'deleted')),
    submitted_at   TEXT,
    verified_at    TEXT,            -- decision time, verify or reject
    verified_by    TEXT,
    rejection_note TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    CHECK ((status = 'rejected') = (rejection_note IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS students_advisor_idx   ON students(advisor_id);
CREATE INDEX IF NOT EXISTS references_student_idx ON achievement_references(student_id);
CREATE INDEX IF NOT EXISTS references_status_idx  ON achievement_references(status);
CREATE INDEX IF NOT EXISTS references_created_idx ON achievement_references(created_at);

PRAGMA user_version = 1;
";
