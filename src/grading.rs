use std::collections::HashMap;

use serde::Serialize;

use crate::store::GradingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
}

impl QuestionKind {
    pub fn from_db(raw: &str) -> Option<Self> {
        match raw {
            "multiple_choice" => Some(Self::MultipleChoice),
            "short_answer" => Some(Self::ShortAnswer),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::ShortAnswer => "short_answer",
        }
    }
}

/// A question as the grader sees it: for multiple choice, the id of the
/// unique correct option (first marked correct in option order, if any);
/// for short answer, the stored expected text.
#[derive(Debug, Clone)]
pub struct QuestionKey {
    pub id: String,
    pub kind: QuestionKind,
    pub correct_option_id: Option<String>,
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TestKey {
    pub id: String,
    pub unit_id: String,
    pub questions: Vec<QuestionKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// Fixed thresholds; reclassified on every submission so the label always
/// reflects the most recent score.
pub fn classify_difficulty(score: f64) -> Difficulty {
    if score < 50.0 {
        Difficulty::Hard
    } else if score < 70.0 {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_correct(question: &QuestionKey, submitted: &str) -> bool {
    match question.kind {
        QuestionKind::MultipleChoice => match &question.correct_option_id {
            Some(correct_id) => submitted.trim() == correct_id,
            // No option marked correct: the question cannot be answered.
            None => false,
        },
        QuestionKind::ShortAnswer => match &question.correct_answer {
            Some(expected) => normalize_answer(submitted) == normalize_answer(expected),
            None => false,
        },
    }
}

/// Percentage score for a submission. Unanswered questions count as wrong;
/// a test with zero questions scores 0 rather than dividing by zero.
pub fn score_submission(questions: &[QuestionKey], answers: &HashMap<String, String>) -> f64 {
    if questions.is_empty() {
        return 0.0;
    }
    let correct = questions
        .iter()
        .filter(|q| {
            answers
                .get(&q.id)
                .map(|a| is_correct(q, a))
                .unwrap_or(false)
        })
        .count();
    correct as f64 / questions.len() as f64 * 100.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub score: f64,
    pub difficulty_level: String,
}

/// Grades a submission and persists the result. `Ok(None)` means the test
/// does not exist or its unit does not belong to the student's mentor; the
/// IPC layer maps that to `not_found`. The progress write is a single
/// upsert keyed on (student_id, unit_id), so a concurrent resubmission
/// overwrites rather than duplicates.
pub fn grade_submission(
    store: &dyn GradingStore,
    test_id: &str,
    student_id: &str,
    answers: &HashMap<String, String>,
) -> anyhow::Result<Option<GradeOutcome>> {
    let Some(test) = store.test_with_questions(test_id, student_id)? else {
        return Ok(None);
    };

    let score = score_submission(&test.questions, answers);
    let difficulty = classify_difficulty(score);
    store.record_test_result(student_id, &test.unit_id, score, difficulty.as_str())?;

    Ok(Some(GradeOutcome {
        score,
        difficulty_level: difficulty.as_str().to_string(),
    }))
}
