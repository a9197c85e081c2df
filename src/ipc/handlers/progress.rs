use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, require_role, required_str, unit_owned_by};
use crate::ipc::types::{AppState, Request};
use crate::schedule::SLOT_FORMAT;
use rusqlite::params;
use serde_json::json;

/// Resolves the unit against the student's linked mentor; a unit outside
/// that curriculum reads as absent.
fn student_unit_check(
    conn: &rusqlite::Connection,
    req: &Request,
    mentor_id: Option<&str>,
    unit_id: &str,
) -> Result<(), serde_json::Value> {
    let Some(mentor_id) = mentor_id else {
        return Err(err(&req.id, "not_found", "no mentor linked", None));
    };
    match unit_owned_by(conn, unit_id, mentor_id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(err(&req.id, "not_found", "unit not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_mark_unit_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = student_unit_check(conn, req, student.mentor_id.as_deref(), &unit_id) {
        return e;
    }

    // Upsert on the unique (student_id, unit_id) pair; a completion never
    // clobbers an existing test result.
    if let Err(e) = conn.execute(
        "INSERT INTO student_progress(student_id, unit_id, completed, test_taken, test_score)
         VALUES(?, ?, 1, 0, NULL)
         ON CONFLICT(student_id, unit_id) DO UPDATE SET completed = 1",
        params![student.id, unit_id],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT unit_id, completed, test_taken, test_score, difficulty_level
         FROM student_progress
         WHERE student_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let progress = match stmt.query_map([&student.id], |r| {
        Ok(json!({
            "unitId": r.get::<_, String>(0)?,
            "completed": r.get::<_, i64>(1)? != 0,
            "testTaken": r.get::<_, i64>(2)? != 0,
            "testScore": r.get::<_, Option<f64>>(3)?,
            "difficultyLevel": r.get::<_, Option<String>>(4)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "progress": progress }))
}

/// Mentor dashboard: progress rows across all linked students, joined
/// with student and unit names.
fn handle_list_for_mentor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT sp.student_id, s.username, sp.unit_id, u.subject, u.unit_name, u.topic_name,
                sp.completed, sp.test_taken, sp.test_score, sp.difficulty_level
         FROM student_progress sp
         JOIN users s ON sp.student_id = s.id
         JOIN study_units u ON sp.unit_id = u.id
         WHERE s.mentor_id = ?
         ORDER BY s.username, u.subject, u.unit_name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let progress = match stmt.query_map([&mentor.id], |r| {
        Ok(json!({
            "studentId": r.get::<_, String>(0)?,
            "studentName": r.get::<_, String>(1)?,
            "unitId": r.get::<_, String>(2)?,
            "subject": r.get::<_, String>(3)?,
            "unitName": r.get::<_, String>(4)?,
            "topicName": r.get::<_, String>(5)?,
            "completed": r.get::<_, i64>(6)? != 0,
            "testTaken": r.get::<_, i64>(7)? != 0,
            "testScore": r.get::<_, Option<f64>>(8)?,
            "difficultyLevel": r.get::<_, Option<String>>(9)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "progress": progress }))
}

/// Records that the student acted on a suggested slot. The schedule itself
/// stays derived; this log only feeds the dashboard's checkmarks.
fn handle_schedule_mark_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = student_unit_check(conn, req, student.mentor_id.as_deref(), &unit_id) {
        return e;
    }
    let suggested_time = match parse_opt_string(req.params.get("suggestedStudyTime")) {
        Ok(Some(v)) => v,
        Ok(None) => chrono::Local::now().naive_local().format(SLOT_FORMAT).to_string(),
        Err(m) => {
            return err(
                &req.id,
                "bad_params",
                format!("suggestedStudyTime {}", m),
                None,
            )
        }
    };

    if let Err(e) = conn.execute(
        "INSERT INTO study_schedule(student_id, unit_id, suggested_study_time, completed)
         VALUES(?, ?, ?, 1)
         ON CONFLICT(student_id, unit_id) DO UPDATE SET
            completed = 1,
            suggested_study_time = excluded.suggested_study_time",
        params![student.id, unit_id, suggested_time],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.markUnitComplete" => Some(handle_mark_unit_complete(state, req)),
        "progress.list" => Some(handle_list(state, req)),
        "progress.listForMentor" => Some(handle_list_for_mentor(state, req)),
        "scheduleLog.markComplete" => Some(handle_schedule_mark_complete(state, req)),
        _ => None,
    }
}
