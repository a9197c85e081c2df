
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn mentor_code_links_students_at_signup() {
    let workspace = temp_dir("schedulr-accounts");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let mentor = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.signup",
        json!({ "username": "ms-frizzle", "password": "bus", "role": "mentor" }),
    );
    let mentor_id = mentor.get("userId").and_then(|v| v.as_str()).expect("userId");
    let code = mentor
        .get("mentorCode")
        .and_then(|v| v.as_str())
        .expect("mentorCode")
        .to_string();
    assert_eq!(code.len(), 8);

    // A student must present a valid code.
    let bad = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "accounts.signup",
        json!({ "username": "arnold", "password": "pw", "role": "student", "mentorCode": "wrong123" }),
    );
    assert_eq!(bad, "bad_params");
    let missing = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "accounts.signup",
        json!({ "username": "arnold", "password": "pw", "role": "student" }),
    );
    assert_eq!(missing, "bad_params");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "accounts.signup",
        json!({ "username": "arnold", "password": "pw", "role": "student", "mentorCode": code }),
    );
    assert!(student.get("userId").and_then(|v| v.as_str()).is_some());

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "accounts.login",
        json!({ "username": "arnold", "password": "pw" }),
    );
    let user = login.get("user").expect("user");
    assert_eq!(user.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(user.get("mentorId").and_then(|v| v.as_str()), Some(mentor_id));
}

#[test]
fn duplicate_usernames_conflict_and_bad_logins_fail() {
    let workspace = temp_dir("schedulr-accounts-dup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.signup",
        json!({ "username": "dup", "password": "one", "role": "mentor" }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "accounts.signup",
        json!({ "username": "dup", "password": "two", "role": "mentor" }),
    );
    assert_eq!(code, "conflict");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "accounts.login",
        json!({ "username": "dup", "password": "wrong" }),
    );
    assert_eq!(code, "invalid_credentials");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "accounts.signup",
        json!({ "username": "odd", "password": "pw", "role": "admin" }),
    );
    assert_eq!(code, "bad_params");
}
