use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, required_str, UserRow};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn user_json(user: &UserRow) -> serde_json::Value {
    json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
        "mentorCode": user.mentor_code,
        "mentorId": user.mentor_id,
    })
}

/// Short shareable code a mentor hands to students at signup.
fn generate_mentor_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if role != "student" && role != "mentor" {
        return err(&req.id, "bad_params", "role must be student or mentor", None);
    }

    // Students link to a mentor through the mentor's code; mentors get a
    // fresh code to hand out.
    let mut mentor_id: Option<String> = None;
    let mut mentor_code: Option<String> = None;
    if role == "student" {
        let code = match parse_opt_string(req.params.get("mentorCode")) {
            Ok(Some(v)) => v,
            Ok(None) => {
                return err(
                    &req.id,
                    "bad_params",
                    "mentorCode is required for student signup",
                    None,
                )
            }
            Err(m) => return err(&req.id, "bad_params", format!("mentorCode {}", m), None),
        };
        let mentor = match conn
            .query_row(
                "SELECT id FROM users WHERE role = 'mentor' AND mentor_code = ?",
                [&code],
                |r| r.get::<_, String>(0),
            )
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        let Some(id) = mentor else {
            return err(&req.id, "bad_params", "invalid mentor code", None);
        };
        mentor_id = Some(id);
    } else {
        mentor_code = Some(generate_mentor_code());
    }

    let taken = match conn
        .query_row("SELECT 1 FROM users WHERE username = ?", [&username], |_r| {
            Ok(())
        })
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken {
        return err(&req.id, "conflict", "username already exists", None);
    }

    let user_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, username, password, role, mentor_code, mentor_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![user_id, username, password, role, mentor_code, mentor_id],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "role": role,
            "mentorCode": mentor_code,
        }),
    )
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let user = match conn
        .query_row(
            "SELECT id, username, role, mentor_code, mentor_id
             FROM users WHERE username = ? AND password = ?",
            params![username, password],
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
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match user {
        Some(user) => ok(&req.id, json!({ "user": user_json(&user) })),
        None => err(&req.id, "invalid_credentials", "invalid credentials", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "accounts.signup" => Some(handle_signup(state, req)),
        "accounts.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
