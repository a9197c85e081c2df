use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::store::ScheduleStore;

/// Wire format for every stored/suggested date-time: `YYYY-MM-DDTHH:MM`.
/// Lexical order on this format is chronological order.
pub const SLOT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub subject: String,
    pub unit_name: String,
    pub topic_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressRow {
    pub completed: bool,
    pub test_taken: bool,
    pub test_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub unit: Unit,
    pub unit_id: String,
    pub suggested_study_time: String,
    pub reason: String,
    pub exam_date: Option<String>,
    pub priority: i64,
    pub completed: bool,
    pub test_taken: bool,
}

/// One rung of the priority ladder. Rungs are evaluated top-down and the
/// first match wins, so precedence lives in the table order, not in
/// nested conditionals.
struct Tier {
    matches: fn(&ProgressRow) -> bool,
    reason: fn(&ProgressRow) -> String,
    with_exam: i64,
    without_exam: i64,
}

const TIERS: [Tier; 4] = [
    Tier {
        matches: |p| !p.completed,
        reason: |_| "Not started".to_string(),
        with_exam: 10,
        without_exam: 5,
    },
    Tier {
        matches: |p| !p.test_taken,
        reason: |_| "Completed, test pending".to_string(),
        with_exam: 9,
        without_exam: 4,
    },
    Tier {
        matches: |p| p.test_score.map(|s| s < 70.0).unwrap_or(false),
        reason: |p| format!("Struggled (score: {:.0}%)", p.test_score.unwrap_or(0.0)),
        with_exam: 8,
        without_exam: 3,
    },
    Tier {
        matches: |_| true,
        reason: |_| "Completed".to_string(),
        with_exam: 1,
        without_exam: 1,
    },
];

/// Priority and reason text for one unit. Pure; absent progress means
/// not-started, absent exam means the low-urgency column.
pub fn priority_and_reason(progress: &ProgressRow, exam_date: Option<&str>) -> (i64, String) {
    for tier in &TIERS {
        if (tier.matches)(progress) {
            let priority = if exam_date.is_some() {
                tier.with_exam
            } else {
                tier.without_exam
            };
            let mut reason = (tier.reason)(progress);
            if let Some(date) = exam_date {
                let day = if date.len() > 10 { &date[..10] } else { date };
                reason.push_str(&format!(" | Exam: {}", day));
            }
            return (priority, reason);
        }
    }
    unreachable!("last tier matches everything");
}

/// Strict parse of a stored exam/session date-time. A literal `T`
/// separator is equivalent to a space; date-only strings get midnight.
/// Anything else is None and callers fall back to their default window.
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.trim().replace('T', " ");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// When to study a unit, from the exam window alone:
/// exam within 3 days (or already past) => a slot two hours from now,
/// truncated to the hour; within 7 days => tomorrow 09:00; further out =>
/// the day after tomorrow 09:00; no exam or unparseable date => tomorrow 09:00.
pub fn suggested_study_time(now: NaiveDateTime, exam_date: Option<&str>) -> String {
    let default_slot = |days: i64| {
        (now + Duration::days(days))
            .date()
            .format("%Y-%m-%d")
            .to_string()
            + "T09:00"
    };

    let Some(exam) = exam_date.and_then(parse_local_datetime) else {
        return default_slot(1);
    };

    let days_until = (exam - now).num_days();
    if days_until <= 3 {
        let slot = (now + Duration::hours(2)).with_minute(0).unwrap_or(now);
        slot.format(SLOT_FORMAT).to_string()
    } else if days_until <= 7 {
        default_slot(1)
    } else {
        default_slot(2)
    }
}

pub fn suggestion_for_unit(
    unit: Unit,
    progress: Option<&ProgressRow>,
    exam_date: Option<&str>,
    now: NaiveDateTime,
) -> Suggestion {
    let default = ProgressRow::default();
    let progress = progress.unwrap_or(&default);
    let (priority, reason) = priority_and_reason(progress, exam_date);
    let unit_id = unit.id.clone();
    Suggestion {
        unit,
        unit_id,
        suggested_study_time: suggested_study_time(now, exam_date),
        reason,
        exam_date: exam_date.map(|s| s.to_string()),
        priority,
        completed: progress.completed,
        test_taken: progress.test_taken,
    }
}

/// One suggestion per unit the mentor owns, ranked by descending priority,
/// ties by earliest suggested slot. Deterministic for a fixed snapshot and
/// `now`; absent progress or exam rows are defaults, never errors.
pub fn generate_schedule(
    store: &dyn ScheduleStore,
    student_id: &str,
    mentor_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<Suggestion>> {
    let units = store.list_units(mentor_id)?;
    let progress = store.list_progress(student_id)?;
    let exams = store.list_exams(mentor_id)?;

    let mut suggestions: Vec<Suggestion> = units
        .into_iter()
        .map(|unit| {
            let prog = progress.get(&unit.id);
            let exam = exams.get(&unit.id).map(|s| s.as_str());
            suggestion_for_unit(unit, prog, exam, now)
        })
        .collect();

    // Stable sort: full ties keep the curriculum listing order.
    suggestions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.suggested_study_time.cmp(&b.suggested_study_time))
    });
    Ok(suggestions)
}
