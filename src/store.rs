use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::grading::{QuestionKey, QuestionKind, TestKey};
use crate::schedule::{ProgressRow, Unit};

/// Read access the schedule generator needs. Injected rather than ambient
/// so the derivation logic tests without a live database.
pub trait ScheduleStore {
    fn list_units(&self, mentor_id: &str) -> anyhow::Result<Vec<Unit>>;
    fn list_progress(&self, student_id: &str) -> anyhow::Result<HashMap<String, ProgressRow>>;
    fn list_exams(&self, mentor_id: &str) -> anyhow::Result<HashMap<String, String>>;
}

/// Read/write access the grading engine needs.
pub trait GradingStore {
    /// The test with its answer key, or None when it does not exist or its
    /// unit is not owned by the student's linked mentor.
    fn test_with_questions(&self, test_id: &str, student_id: &str)
        -> anyhow::Result<Option<TestKey>>;

    /// Single upsert on the (student_id, unit_id) uniqueness constraint:
    /// marks the test taken with the given score and difficulty; a freshly
    /// created row is also marked completed (submitting implies studied).
    fn record_test_result(
        &self,
        student_id: &str,
        unit_id: &str,
        score: f64,
        difficulty: &str,
    ) -> anyhow::Result<()>;
}

pub struct SqliteStore<'a> {
    pub conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ScheduleStore for SqliteStore<'_> {
    fn list_units(&self, mentor_id: &str) -> anyhow::Result<Vec<Unit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, unit_name, topic_name
             FROM study_units
             WHERE mentor_id = ?
             ORDER BY subject, unit_name",
        )?;
        let units = stmt
            .query_map([mentor_id], |r| {
                Ok(Unit {
                    id: r.get(0)?,
                    subject: r.get(1)?,
                    unit_name: r.get(2)?,
                    topic_name: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    fn list_progress(&self, student_id: &str) -> anyhow::Result<HashMap<String, ProgressRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_id, completed, test_taken, test_score
             FROM student_progress
             WHERE student_id = ?",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    ProgressRow {
                        completed: r.get::<_, i64>(1)? != 0,
                        test_taken: r.get::<_, i64>(2)? != 0,
                        test_score: r.get::<_, Option<f64>>(3)?,
                    },
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    fn list_exams(&self, mentor_id: &str) -> anyhow::Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT unit_id, exam_date FROM exams WHERE mentor_id = ?")?;
        let rows = stmt
            .query_map([mentor_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}

impl GradingStore for SqliteStore<'_> {
    fn test_with_questions(
        &self,
        test_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Option<TestKey>> {
        // Ownership check traverses test -> unit -> mentor; a raw test id
        // from another mentor's curriculum is indistinguishable from absent.
        let header = self
            .conn
            .query_row(
                "SELECT t.id, t.unit_id
                 FROM tests t
                 JOIN study_units u ON t.unit_id = u.id
                 JOIN users s ON s.id = ?
                 WHERE t.id = ? AND u.mentor_id = s.mentor_id",
                params![student_id, test_id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((id, unit_id)) = header else {
            return Ok(None);
        };

        let mut q_stmt = self.conn.prepare(
            "SELECT id, kind, correct_answer
             FROM questions
             WHERE test_id = ?
             ORDER BY sort_order, id",
        )?;
        let raw_questions = q_stmt
            .query_map([&id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut opt_stmt = self.conn.prepare(
            "SELECT id FROM options
             WHERE question_id = ? AND is_correct = 1
             ORDER BY sort_order, id
             LIMIT 1",
        )?;

        let mut questions = Vec::with_capacity(raw_questions.len());
        for (qid, kind_raw, correct_answer) in raw_questions {
            let Some(kind) = QuestionKind::from_db(&kind_raw) else {
                anyhow::bail!("unknown question kind: {}", kind_raw);
            };
            let correct_option_id = match kind {
                QuestionKind::MultipleChoice => opt_stmt
                    .query_row([&qid], |r| r.get::<_, String>(0))
                    .optional()?,
                QuestionKind::ShortAnswer => None,
            };
            questions.push(QuestionKey {
                id: qid,
                kind,
                correct_option_id,
                correct_answer,
            });
        }

        Ok(Some(TestKey {
            id,
            unit_id,
            questions,
        }))
    }

    fn record_test_result(
        &self,
        student_id: &str,
        unit_id: &str,
        score: f64,
        difficulty: &str,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO student_progress(student_id, unit_id, completed, test_taken, test_score, difficulty_level)
             VALUES(?, ?, 1, 1, ?, ?)
             ON CONFLICT(student_id, unit_id) DO UPDATE SET
                test_taken = 1,
                test_score = excluded.test_score,
                difficulty_level = excluded.difficulty_level",
            params![student_id, unit_id, score, difficulty],
        )?;
        Ok(())
    }
}
