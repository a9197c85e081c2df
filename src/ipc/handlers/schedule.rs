use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, require_role};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{generate_schedule, parse_local_datetime};
use crate::store::SqliteStore;
use serde_json::json;

/// `schedule.generate {studentId, now?}` — the adaptive suggestion list
/// for the student's dashboard. `now` is an optional `YYYY-MM-DDTHH:MM`
/// override so callers get reproducible output; it defaults to the
/// current local time.
fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match require_role(conn, req, "studentId", "student") {
        Ok(u) => u,
        Err(e) => return e,
    };
    let Some(mentor_id) = student.mentor_id else {
        // An unlinked student has no curriculum to schedule.
        return ok(&req.id, json!({ "suggestions": [] }));
    };
    let now = match parse_opt_string(req.params.get("now")) {
        Ok(Some(raw)) => match parse_local_datetime(&raw) {
            Some(dt) => dt,
            None => return err(&req.id, "bad_params", "now must be an ISO date-time", None),
        },
        Ok(None) => chrono::Local::now().naive_local(),
        Err(m) => return err(&req.id, "bad_params", format!("now {}", m), None),
    };

    let store = SqliteStore::new(conn);
    match generate_schedule(&store, &student.id, &mentor_id, now) {
        Ok(suggestions) => ok(&req.id, json!({ "suggestions": suggestions })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.generate" => Some(handle_generate(state, req)),
        _ => None,
    }
}
