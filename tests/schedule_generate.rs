
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

struct Classroom {
    mentor_id: String,
    student_id: String,
}

fn setup_classroom(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> Classroom {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "c1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mentor = request_ok(
        stdin,
        reader,
        "c2",
        "accounts.signup",
        json!({ "username": "mentor", "password": "pw", "role": "mentor" }),
    );
    let mentor_id = mentor
        .get("userId")
        .and_then(|v| v.as_str())
        .expect("userId")
        .to_string();
    let code = mentor.get("mentorCode").and_then(|v| v.as_str()).expect("code");
    let student = request_ok(
        stdin,
        reader,
        "c3",
        "accounts.signup",
        json!({ "username": "student", "password": "pw", "role": "student", "mentorCode": code }),
    );
    let student_id = student
        .get("userId")
        .and_then(|v| v.as_str())
        .expect("userId")
        .to_string();
    Classroom {
        mentor_id,
        student_id,
    }
}

fn create_unit(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    mentor_id: &str,
    subject: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        "cu",
        "units.create",
        json!({
            "mentorId": mentor_id,
            "subject": subject,
            "unitName": format!("{} 101", subject),
            "topicName": "Basics",
        }),
    );
    created
        .get("unitId")
        .and_then(|v| v.as_str())
        .expect("unitId")
        .to_string()
}

fn generate(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    student_id: &str,
    now: &str,
) -> Vec<serde_json::Value> {
    let result = request_ok(
        stdin,
        reader,
        "gen",
        "schedule.generate",
        json!({ "studentId": student_id, "now": now }),
    );
    result
        .get("suggestions")
        .and_then(|v| v.as_array())
        .expect("suggestions")
        .clone()
}

fn field<'a>(s: &'a serde_json::Value, key: &str) -> &'a str {
    s.get(key).and_then(|v| v.as_str()).expect(key)
}

#[test]
fn fresh_unit_defaults_to_tomorrow_morning() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class = setup_classroom(&mut stdin, &mut reader, "schedulr-sched-fresh");
    let unit_id = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Algebra");

    let suggestions = generate(&mut stdin, &mut reader, &class.student_id, "2026-09-10T12:00");
    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    assert_eq!(field(s, "unitId"), unit_id);
    assert_eq!(field(s, "reason"), "Not started");
    assert_eq!(s.get("priority").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(field(s, "suggestedStudyTime"), "2026-09-11T09:00");
    assert!(s.get("examDate").expect("examDate").is_null());
    assert_eq!(s.get("completed").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(s.get("testTaken").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn exam_urgency_and_struggle_order_the_plan() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class = setup_classroom(&mut stdin, &mut reader, "schedulr-sched-ladder");

    let algebra = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Algebra");
    let biology = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Biology");
    let chemistry = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Chemistry");
    let drama = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Drama");
    let economics = create_unit(&mut stdin, &mut reader, &class.mentor_id, "Economics");

    // Biology: exam in two days. Economics: exam far out.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.set",
        json!({ "mentorId": class.mentor_id, "unitId": biology, "examDate": "2026-09-12" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.set",
        json!({ "mentorId": class.mentor_id, "unitId": economics, "examDate": "2026-09-25" }),
    );

    // Chemistry: a failed test (one of two right) plus a mid-range exam.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "exams.set",
        json!({ "mentorId": class.mentor_id, "unitId": chemistry, "examDate": "2026-09-16" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "tests.create",
        json!({
            "mentorId": class.mentor_id,
            "unitId": chemistry,
            "input": {
                "title": "Chem check",
                "questions": [
                    {
                        "kind": "multipleChoice",
                        "text": "Symbol for gold?",
                        "options": [
                            { "text": "Ag" },
                            { "text": "Au", "isCorrect": true },
                        ],
                    },
                    {
                        "kind": "shortAnswer",
                        "text": "Symbol for iron?",
                        "answer": "Fe",
                    },
                ],
            },
        }),
    );
    let test_id = field(&created, "testId").to_string();
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "tests.open",
        json!({ "testId": test_id, "userId": class.student_id }),
    );
    let questions = opened.get("questions").and_then(|v| v.as_array()).expect("questions");
    let mcq_id = field(&questions[0], "id").to_string();
    let au_id = questions[0]
        .get("options")
        .and_then(|v| v.as_array())
        .expect("options")
        .iter()
        .find(|o| o.get("text").and_then(|v| v.as_str()) == Some("Au"))
        .map(|o| field(o, "id").to_string())
        .expect("Au option");
    let short_id = field(&questions[1], "id").to_string();
    let graded = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "tests.submit",
        json!({
            "studentId": class.student_id,
            "testId": test_id,
            "answers": { mcq_id: au_id, short_id: "Cu" },
        }),
    );
    assert_eq!(graded.get("score").and_then(|v| v.as_f64()), Some(50.0));

    // Drama: completed, no test written yet.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "progress.markUnitComplete",
        json!({ "studentId": class.student_id, "unitId": drama }),
    );

    let suggestions = generate(&mut stdin, &mut reader, &class.student_id, "2026-09-10T12:00");
    let order: Vec<&str> = suggestions.iter().map(|s| field(s, "unitId")).collect();
    assert_eq!(order, vec![
        biology.as_str(),
        economics.as_str(),
        chemistry.as_str(),
        algebra.as_str(),
        drama.as_str(),
    ]);

    // Imminent exam: top priority, a slot two hours out on the hour.
    let b = &suggestions[0];
    assert_eq!(b.get("priority").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(field(b, "reason"), "Not started | Exam: 2026-09-12");
    assert_eq!(field(b, "suggestedStudyTime"), "2026-09-10T14:00");

    // Distant exam: same rung, later slot, so it sorts second.
    let e = &suggestions[1];
    assert_eq!(e.get("priority").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(field(e, "suggestedStudyTime"), "2026-09-12T09:00");

    // Failed test within the exam week.
    let c = &suggestions[2];
    assert_eq!(c.get("priority").and_then(|v| v.as_i64()), Some(8));
    assert_eq!(field(c, "reason"), "Struggled (score: 50%) | Exam: 2026-09-16");
    assert_eq!(field(c, "suggestedStudyTime"), "2026-09-11T09:00");
    assert_eq!(c.get("completed").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(c.get("testTaken").and_then(|v| v.as_bool()), Some(true));

    let d = &suggestions[4];
    assert_eq!(d.get("priority").and_then(|v| v.as_i64()), Some(4));
    assert_eq!(field(d, "reason"), "Completed, test pending");
}

#[test]
fn same_inputs_same_plan() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class = setup_classroom(&mut stdin, &mut reader, "schedulr-sched-stable");
    create_unit(&mut stdin, &mut reader, &class.mentor_id, "Algebra");
    create_unit(&mut stdin, &mut reader, &class.mentor_id, "Biology");
    create_unit(&mut stdin, &mut reader, &class.mentor_id, "Chemistry");

    let first = generate(&mut stdin, &mut reader, &class.student_id, "2026-09-10T12:00");
    let second = generate(&mut stdin, &mut reader, &class.student_id, "2026-09-10T12:00");
    assert_eq!(first, second);
}
