use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, require_role, required_str, unit_owned_by};
use crate::ipc::types::{AppState, Request};
use crate::schedule::parse_local_datetime;
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor_id = match required_str(req, "mentorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // One test per unit, so a LEFT JOIN attaches it directly.
    let mut stmt = match conn.prepare(
        "SELECT u.id, u.subject, u.unit_name, u.topic_name, t.id, t.title
         FROM study_units u
         LEFT JOIN tests t ON t.unit_id = u.id
         WHERE u.mentor_id = ?
         ORDER BY u.subject, u.unit_name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let units = match stmt.query_map([&mentor_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "subject": r.get::<_, String>(1)?,
            "unitName": r.get::<_, String>(2)?,
            "topicName": r.get::<_, String>(3)?,
            "testId": r.get::<_, Option<String>>(4)?,
            "testTitle": r.get::<_, Option<String>>(5)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "units": units }))
}

fn unit_input(req: &Request) -> Result<(String, String, String), serde_json::Value> {
    let subject = required_str(req, "subject")?;
    let unit_name = required_str(req, "unitName")?;
    let topic_name = required_str(req, "topicName")?;
    Ok((subject, unit_name, topic_name))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let (subject, unit_name, topic_name) = match unit_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let unit_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO study_units(id, mentor_id, subject, unit_name, topic_name)
         VALUES(?, ?, ?, ?, ?)",
        params![unit_id, mentor.id, subject, unit_name, topic_name],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "unitId": unit_id }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (subject, unit_name, topic_name) = match unit_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "UPDATE study_units SET subject = ?, unit_name = ?, topic_name = ?
         WHERE id = ? AND mentor_id = ?",
        params![subject, unit_name, topic_name, unit_id, mentor.id],
    ) {
        Ok(0) => err(&req.id, "not_found", "unit not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match unit_owned_by(conn, &unit_id, &mentor.id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "unit not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // Cascade in reverse dependency order, one transaction.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let cascade = [
        "DELETE FROM exams WHERE unit_id = ?1",
        "DELETE FROM study_schedule WHERE unit_id = ?1",
        "DELETE FROM options WHERE question_id IN (
            SELECT id FROM questions WHERE test_id IN (SELECT id FROM tests WHERE unit_id = ?1))",
        "DELETE FROM questions WHERE test_id IN (SELECT id FROM tests WHERE unit_id = ?1)",
        "DELETE FROM tests WHERE unit_id = ?1",
        "DELETE FROM student_progress WHERE unit_id = ?1",
        "DELETE FROM study_units WHERE id = ?1",
    ];
    for sql in cascade {
        if let Err(e) = tx.execute(sql, [&unit_id]) {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_exam_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_date = match required_str(req, "examDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if parse_local_datetime(&exam_date).is_none() {
        return err(&req.id, "bad_params", "examDate must be an ISO date-time", None);
    }
    let subject = match unit_owned_by(conn, &unit_id, &mentor.id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "unit not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // One exam per unit: insert-or-update on the unit key.
    if let Err(e) = conn.execute(
        "INSERT INTO exams(unit_id, mentor_id, subject, exam_date)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(unit_id) DO UPDATE SET exam_date = excluded.exam_date, subject = excluded.subject",
        params![unit_id, mentor.id, subject, exam_date],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_exam_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor = match require_role(conn, req, "mentorId", "mentor") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM exams WHERE unit_id = ? AND mentor_id = ?",
        params![unit_id, mentor.id],
    ) {
        Ok(0) => err(&req.id, "not_found", "exam not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_exam_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mentor_id = match required_str(req, "mentorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT e.unit_id, e.subject, e.exam_date, u.unit_name, u.topic_name
         FROM exams e
         JOIN study_units u ON e.unit_id = u.id
         WHERE e.mentor_id = ?
         ORDER BY e.exam_date ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let exams = match stmt.query_map([&mentor_id], |r| {
        Ok(json!({
            "unitId": r.get::<_, String>(0)?,
            "subject": r.get::<_, String>(1)?,
            "examDate": r.get::<_, String>(2)?,
            "unitName": r.get::<_, String>(3)?,
            "topicName": r.get::<_, String>(4)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "exams": exams }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "units.list" => Some(handle_list(state, req)),
        "units.create" => Some(handle_create(state, req)),
        "units.update" => Some(handle_update(state, req)),
        "units.delete" => Some(handle_delete(state, req)),
        "exams.set" => Some(handle_exam_set(state, req)),
        "exams.remove" => Some(handle_exam_remove(state, req)),
        "exams.list" => Some(handle_exam_list(state, req)),
        _ => None,
    }
}
