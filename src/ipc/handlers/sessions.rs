use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, require_role, required_str};
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
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, subject, start_time, notes, completed
         FROM study_sessions
         WHERE student_id = ?
         ORDER BY start_time ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let sessions = match stmt.query_map([&student.id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "subject": r.get::<_, String>(1)?,
            "startTime": r.get::<_, String>(2)?,
            "notes": r.get::<_, String>(3)?,
            "completed": r.get::<_, i64>(4)? != 0,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "sessions": sessions }))
}

fn session_input(req: &Request) -> Result<(String, String, String), serde_json::Value> {
    let subject = required_str(req, "subject")?;
    let start_time = required_str(req, "startTime")?;
    if parse_local_datetime(&start_time).is_none() {
        return Err(err(
            &req.id,
            "bad_params",
            "startTime must be an ISO date-time",
            None,
        ));
    }
    let notes = match parse_opt_string(req.params.get("notes")) {
        Ok(v) => v.unwrap_or_default(),
        Err(m) => return Err(err(&req.id, "bad_params", format!("notes {}", m), None)),
    };
    Ok((subject, start_time, notes))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let (subject, start_time, notes) = match session_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let session_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO study_sessions(id, student_id, subject, start_time, notes, completed)
         VALUES(?, ?, ?, ?, ?, 0)",
        params![session_id, student.id, subject, start_time, notes],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "sessionId": session_id }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (subject, start_time, notes) = match session_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "UPDATE study_sessions SET subject = ?, start_time = ?, notes = ?
         WHERE id = ? AND student_id = ?",
        params![subject, start_time, notes, session_id, student.id],
    ) {
        Ok(0) => err(&req.id, "not_found", "session not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM study_sessions WHERE id = ? AND student_id = ?",
        params![session_id, student.id],
    ) {
        Ok(0) => err(&req.id, "not_found", "session not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_toggle_completed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let current = match conn
        .query_row(
            "SELECT completed FROM study_sessions WHERE id = ? AND student_id = ?",
            params![session_id, student.id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
    {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "session not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let next = if current == 0 { 1 } else { 0 };
    if let Err(e) = conn.execute(
        "UPDATE study_sessions SET completed = ? WHERE id = ? AND student_id = ?",
        params![next, session_id, student.id],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "completed": next != 0 }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_list(state, req)),
        "sessions.create" => Some(handle_create(state, req)),
        "sessions.update" => Some(handle_update(state, req)),
        "sessions.delete" => Some(handle_delete(state, req)),
        "sessions.toggleCompleted" => Some(handle_toggle_completed(state, req)),
        _ => None,
    }
}
