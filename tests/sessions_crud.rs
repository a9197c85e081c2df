
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn setup_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> String {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mentor = request_ok(
        stdin,
        reader,
        "s2",
        "accounts.signup",
        json!({ "username": "mentor", "password": "pw", "role": "mentor" }),
    );
    let code = mentor.get("mentorCode").and_then(|v| v.as_str()).expect("code");
    let student = request_ok(
        stdin,
        reader,
        "s3",
        "accounts.signup",
        json!({ "username": "student", "password": "pw", "role": "student", "mentorCode": code }),
    );
    student
        .get("userId")
        .and_then(|v| v.as_str())
        .expect("userId")
        .to_string()
}

#[test]
fn create_update_toggle_delete_roundtrip() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, "schedulr-sessions");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.create",
        json!({
            "studentId": student_id,
            "subject": "Biology",
            "startTime": "2026-09-01T14:00",
            "notes": "chapter 3",
        }),
    );
    let session_id = created
        .get("sessionId")
        .and_then(|v| v.as_str())
        .expect("sessionId")
        .to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.list",
        json!({ "studentId": student_id }),
    );
    let sessions = listed.get("sessions").and_then(|v| v.as_array()).expect("sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].get("subject").and_then(|v| v.as_str()), Some("Biology"));
    assert_eq!(sessions[0].get("completed").and_then(|v| v.as_bool()), Some(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.update",
        json!({
            "studentId": student_id,
            "sessionId": session_id,
            "subject": "Chemistry",
            "startTime": "2026-09-02T10:00",
            "notes": "",
        }),
    );
    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.toggleCompleted",
        json!({ "studentId": student_id, "sessionId": session_id }),
    );
    assert_eq!(toggled.get("completed").and_then(|v| v.as_bool()), Some(true));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.list",
        json!({ "studentId": student_id }),
    );
    let sessions = listed.get("sessions").and_then(|v| v.as_array()).expect("sessions");
    assert_eq!(sessions[0].get("subject").and_then(|v| v.as_str()), Some("Chemistry"));
    assert_eq!(sessions[0].get("startTime").and_then(|v| v.as_str()), Some("2026-09-02T10:00"));
    assert_eq!(sessions[0].get("completed").and_then(|v| v.as_bool()), Some(true));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.delete",
        json!({ "studentId": student_id, "sessionId": session_id }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.list",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        listed.get("sessions").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(0)
    );
}

#[test]
fn rejects_bad_start_times_and_foreign_sessions() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, "schedulr-sessions-guard");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.create",
        json!({
            "studentId": student_id,
            "subject": "Biology",
            "startTime": "next tuesday",
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.delete",
        json!({ "studentId": student_id, "sessionId": "no-such-session" }),
    );
    assert_eq!(code, "not_found");

    // A mentor id is not a valid session owner.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.list",
        json!({ "studentId": "no-such-user" }),
    );
    assert_eq!(code, "not_found");
}
