// =========================
// tests/integration/student_flow_tests.rs
// =========================
//! A student from sign-in to a completed checklist.
use axum::http::StatusCode;
use labpass_backend::storage::AccountStore;
use serde_json::json;

use crate::test_utils::TestApp;

#[tokio::test]
async fn test_sign_in_then_register() {
    let (app, storage) = TestApp::memory().await;

    let (status, body) = app
        .post("/auth/identity", None, json!({ "subject": "google|1001" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], "/student/register");
    let token = body["session_token"].as_str().unwrap().to_string();

    // Nothing but registration before registering
    let (status, body) = app.get("/student", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "REG_001");

    let (status, body) = app
        .post(
            "/student/register",
            Some(&token),
            json!({ "id_num": "12012345", "id_num_confirm": "12012346", "course": "BSCS-ST" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_001");

    let (status, body) = app
        .post(
            "/student/register",
            Some(&token),
            json!({ "id_num": "12012345", "id_num_confirm": "12012345", "course": "-" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post(
            "/student/register",
            Some(&token),
            json!({ "id_num": "12012345", "id_num_confirm": "12012345", "course": "BSMSCS" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["logged_out"], false);

    let (status, body) = app.get("/student", &token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["lab_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["labName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["CAR", "GAMELAB", "Talk"]);
    assert_eq!(body["complete"], false);

    // Only the digest of the subject is stored
    let account = storage.find_by_id_num("12012345").await.unwrap().unwrap();
    assert_ne!(account.sub_id, "google|1001");
    assert_eq!(account.sub_id.len(), 64);

    // Signing in again goes straight to the checklist
    let (_, body) = app
        .post("/auth/identity", None, json!({ "subject": "google|1001" }))
        .await;
    assert_eq!(body["redirect"], "/student");
}

#[tokio::test]
async fn test_id_number_cannot_be_reused_or_registered_twice() {
    let (app, _storage) = TestApp::memory().await;
    let first = app.registered_student("google|1", "2001").await;

    let (status, _) = app
        .post(
            "/student/register",
            Some(&first),
            json!({ "id_num": "2002", "id_num_confirm": "2002", "course": "Others" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let second = app.student_token("google|2").await;
    let (status, body) = app
        .post(
            "/student/register",
            Some(&second),
            json!({ "id_num": "2001", "id_num_confirm": "2001", "course": "Others" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_001");
}

#[tokio::test]
async fn test_booth_code_check_outcomes() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    app.add_lab_with_head(&officer, "robotics", "robotics.head", "robotics-pass")
        .await;
    let student = app.registered_student("google|7", "3001").await;

    let (status, body) = app.get("/student/lab/robotics", &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lab"], "ROBOTICS");

    // Before the lab head opens the booth page
    let (status, body) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "ROBOTICS", "code": "123456" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "NotActivated");
    assert_eq!(body["message"], "Code not yet activated.");

    let head = app.lab_head_token("robotics.head", "robotics-pass").await;
    let code = app.displayed_code("/lab/ROBOTICS", &head).await;

    let (_, body) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "ROBOTICS", "code": "000000" }),
        )
        .await;
    assert_eq!(body["outcome"], "Incorrect");
    assert_eq!(body["message"], "Incorrect code. Please check the code from lab head.");

    let (_, body) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "robotics", "code": code }),
        )
        .await;
    assert_eq!(body["outcome"], "Accepted");
    assert_eq!(body["message"], "ROBOTICS Code accepted.");

    let (status, body) = app.get("/student/lab/ROBOTICS", &student).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CHK_001");

    let (_, body) = app.get("/student", &student).await;
    let entry = body["lab_list"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["labName"] == "ROBOTICS")
        .unwrap()
        .clone();
    assert_eq!(entry["visited"], true);
    assert!(entry["visitTime"].is_string());
}

#[tokio::test]
async fn test_unknown_lab_is_reported() {
    let (app, _storage) = TestApp::memory().await;
    let student = app.registered_student("google|8", "3002").await;

    let (status, body) = app.get("/student/lab/NOPE", &student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "LAB_001");

    let (status, _) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "NOPE", "code": "123456" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_codes_lock_the_student_out() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    let student = app.registered_student("google|9", "3003").await;
    app.displayed_code("/lab/CAR", &officer).await;

    let max = app.state.settings.attempts.max_attempts;
    for _ in 0..max {
        let (status, body) = app
            .post(
                "/student/code_check",
                Some(&student),
                json!({ "lab_name": "CAR", "code": "000000" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "Incorrect");
    }

    let (status, body) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "CAR", "code": "000000" }),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_002");
}

#[tokio::test]
async fn test_seminar_accepts_any_presenting_lab() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    let student = app.registered_student("google|10", "3004").await;

    let (status, body) = app
        .post("/student/seminar_check", Some(&student), json!({ "code": "123456" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "NotActivated");

    // The officers can present any lab's talk page
    let talk_code = app.displayed_code("/lab/GAMELAB/talk", &officer).await;
    let booth_code = app.state.registry.get_code("GAMELAB", labpass_common::CodeKind::Booth).unwrap();
    if booth_code != talk_code {
        let (_, body) = app
            .post("/student/seminar_check", Some(&student), json!({ "code": booth_code }))
            .await;
        assert_eq!(body["outcome"], "Incorrect");
    }

    let (status, body) = app.get("/student/seminar", &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lab"], "Talk");

    let (_, body) = app
        .post("/student/seminar_check", Some(&student), json!({ "code": talk_code }))
        .await;
    assert_eq!(body["outcome"], "Accepted");
    assert_eq!(body["lab_name"], "Talk");

    let (status, _) = app.get("/student/seminar", &student).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_done_only_when_complete() {
    let (app, _temp_dir) = TestApp::flat_file().await;
    let officer = app.officer_token().await;
    let student = app.registered_student("google|11", "3005").await;

    let (status, _) = app.get("/student/done", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for lab in ["CAR", "GAMELAB"] {
        let code = app.displayed_code(&format!("/lab/{lab}"), &officer).await;
        let (_, body) = app
            .post(
                "/student/code_check",
                Some(&student),
                json!({ "lab_name": lab, "code": code }),
            )
            .await;
        assert_eq!(body["outcome"], "Accepted");
    }
    let talk_code = app.displayed_code("/lab/keynote", &officer).await;
    let (_, body) = app
        .post("/student/seminar_check", Some(&student), json!({ "code": talk_code }))
        .await;
    assert_eq!(body["outcome"], "Accepted");

    let (status, body) = app.get("/student/done", &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);
}

#[tokio::test]
async fn test_register_only_mode_ends_sessions() {
    let storage = std::sync::Arc::new(labpass_backend::storage::MemoryStorage::new());
    let mut settings = crate::test_utils::test_settings();
    settings.event.register_only = true;
    let app = TestApp::with_storage(storage, settings).await;

    let token = app.student_token("google|12").await;
    let (_, body) = app
        .post(
            "/student/register",
            Some(&token),
            json!({ "id_num": "4001", "id_num_confirm": "4001", "course": "Others" }),
        )
        .await;
    assert_eq!(body["logged_out"], true);

    let (status, _) = app.get("/student", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post("/auth/identity", None, json!({ "subject": "google|12" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("session_token").is_none());
    assert_eq!(body["redirect"], "/registered");
}

#[tokio::test]
async fn test_requests_need_a_session() {
    let (app, _storage) = TestApp::memory().await;
    let (status, body) = app
        .send(axum::http::Method::GET, "/student", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_001");

    let (status, _) = app.get("/student", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.student_token("google|13").await;
    let (status, _) = app.send(axum::http::Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/student", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
