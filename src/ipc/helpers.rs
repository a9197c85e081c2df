use rusqlite::{Connection, OptionalExtension};
use serde_json::Value as JsonValue;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub role: String,
    pub mentor_code: Option<String>,
    pub mentor_id: Option<String>,
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn load_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, username, role, mentor_code, mentor_id FROM users WHERE id = ?",
        [user_id],
        |r| {
            Ok(UserRow {
                id: r.get(0)?,
                username: r.get(1)?,
                role: r.get(2)?,
                mentor_code: r.get(3)?,
                mentor_id: r.get(4)?,
            })
        },
    )
    .optional()
}

/// Role-checked lookup used by every mutating handler; a wrong-role or
/// unknown id reads as absent rather than leaking who exists.
pub fn require_role(
    conn: &Connection,
    req: &Request,
    key: &str,
    role: &str,
) -> Result<UserRow, serde_json::Value> {
    let user_id = required_str(req, key)?;
    match load_user(conn, &user_id) {
        Ok(Some(user)) if user.role == role => Ok(user),
        Ok(_) => Err(err(
            &req.id,
            "not_found",
            format!("{} not found", role),
            None,
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

pub fn unit_owned_by(
    conn: &Connection,
    unit_id: &str,
    mentor_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT subject FROM study_units WHERE id = ? AND mentor_id = ?",
        [unit_id, mentor_id],
        |r| r.get::<_, String>(0),
    )
    .optional()
}
