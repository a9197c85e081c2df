use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("schedulr.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('student', 'mentor')),
            mentor_code TEXT UNIQUE,
            mentor_id TEXT,
            FOREIGN KEY(mentor_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_mentor ON users(mentor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_sessions(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            start_time TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            completed INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(student_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_sessions_student ON study_sessions(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_units(
            id TEXT PRIMARY KEY,
            mentor_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            unit_name TEXT NOT NULL,
            topic_name TEXT NOT NULL,
            FOREIGN KEY(mentor_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_units_mentor ON study_units(mentor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            mentor_id TEXT NOT NULL,
            unit_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL DEFAULT 'Test',
            FOREIGN KEY(mentor_id) REFERENCES users(id),
            FOREIGN KEY(unit_id) REFERENCES study_units(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_mentor ON tests(mentor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('multiple_choice', 'short_answer')),
            correct_answer TEXT,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            UNIQUE(test_id, sort_order)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_test ON questions(test_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS options(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            option_text TEXT NOT NULL,
            is_correct INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(question_id) REFERENCES questions(id),
            UNIQUE(question_id, sort_order)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_options_question ON options(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_progress(
            student_id TEXT NOT NULL,
            unit_id TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            test_taken INTEGER NOT NULL DEFAULT 0,
            test_score REAL,
            difficulty_level TEXT,
            PRIMARY KEY(student_id, unit_id),
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(unit_id) REFERENCES study_units(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_progress_unit ON student_progress(unit_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            unit_id TEXT PRIMARY KEY,
            mentor_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            exam_date TEXT NOT NULL,
            FOREIGN KEY(unit_id) REFERENCES study_units(id),
            FOREIGN KEY(mentor_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_mentor ON exams(mentor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_schedule(
            student_id TEXT NOT NULL,
            unit_id TEXT NOT NULL,
            suggested_study_time TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(student_id, unit_id),
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(unit_id) REFERENCES study_units(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_schedule_unit ON study_schedule(unit_id)",
        [],
    )?;

    Ok(conn)
}
