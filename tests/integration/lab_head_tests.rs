// =========================
// tests/integration/lab_head_tests.rs
// =========================
//! Lab head pages and the activation heartbeat behind them.
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use labpass_backend::storage::MemoryStorage;
use serde_json::json;

use crate::test_utils::{test_settings, TestApp};

#[tokio::test]
async fn test_login_redirects() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    app.add_lab_with_head(&officer, "ROBOTICS", "robotics.head", "robotics-pass")
        .await;

    let (_, body) = app
        .post(
            "/lab/login",
            None,
            json!({ "username": "robotics.head", "password": "robotics-pass" }),
        )
        .await;
    assert_eq!(body["redirect"], "/lab/ROBOTICS");

    let (_, body) = app
        .post(
            "/lab/login",
            None,
            json!({ "username": "officers", "password": "officers-password" }),
        )
        .await;
    assert_eq!(body["redirect"], "/lab/keynote");

    let (status, body) = app
        .post(
            "/lab/login",
            None,
            json!({ "username": "robotics.head", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_001");
}

#[tokio::test]
async fn test_lab_heads_see_only_their_lab() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    app.add_lab_with_head(&officer, "ROBOTICS", "robotics.head", "robotics-pass")
        .await;
    let head = app.lab_head_token("robotics.head", "robotics-pass").await;

    let (status, body) = app.get("/lab/robotics", &head).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lab_name"], "ROBOTICS");
    assert_eq!(body["kind"], "Booth");
    assert_eq!(body["period"], 60);
    let code = body["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let (status, body) = app.get("/lab/ROBOTICS/talk", &head).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "Talk");

    let (status, _) = app.get("/lab/CAR", &head).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/lab/keynote", &head).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/lab/NOPE", &head).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Students never see codes
    let student = app.student_token("google|20").await;
    let (status, _) = app.get("/lab/ROBOTICS", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_keynote_has_only_a_talk_code() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;

    let (status, body) = app.get("/lab/keynote", &officer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lab_name"], "KEYNOTE");
    assert_eq!(body["kind"], "Talk");
    assert!(app.state.registry.is_activated("KEYNOTE"));

    // KEYNOTE is not a catalog lab
    let (status, _) = app.get("/lab/KEYNOTE/talk", &officer).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_closed_booth_page_deactivates_lab() {
    let (app, _storage) = TestApp::memory().await;
    let officer = app.officer_token().await;
    let student = app.registered_student("google|21", "5001").await;
    let heartbeat = app.state.watchdog.heartbeat();

    let code = app.displayed_code("/lab/CAR", &officer).await;
    assert!(app.state.registry.is_activated("CAR"));

    // Re-rendering inside the window keeps the lab live
    tokio::time::sleep(heartbeat - Duration::from_secs(1)).await;
    app.displayed_code("/lab/CAR", &officer).await;
    tokio::time::sleep(heartbeat - Duration::from_secs(1)).await;
    assert!(app.state.registry.is_activated("CAR"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!app.state.registry.is_activated("CAR"));

    let (_, body) = app
        .post(
            "/student/code_check",
            Some(&student),
            json!({ "lab_name": "CAR", "code": code }),
        )
        .await;
    assert_eq!(body["outcome"], "NotActivated");
}

#[tokio::test]
async fn test_separate_talk_clock() {
    let mut settings = test_settings();
    settings.codes.talk_countdown_secs = Some(30);
    let app = TestApp::with_storage(Arc::new(MemoryStorage::new()), settings).await;
    let officer = app.officer_token().await;

    let (_, booth) = app.get("/lab/CAR", &officer).await;
    let (_, talk) = app.get("/lab/CAR/talk", &officer).await;
    assert_eq!(booth["period"], 60);
    assert_eq!(talk["period"], 30);

    let before = app.state.registry.snapshot("CAR").unwrap();
    let talk_clock = app.state.talk_clock.clone().unwrap();
    for _ in 0..30 {
        talk_clock.tick();
    }
    let after = app.state.registry.snapshot("CAR").unwrap();
    assert_eq!(before.code, after.code);
}

#[tokio::test]
async fn test_health() {
    let (app, _storage) = TestApp::memory().await;
    let (status, body) = app
        .send(axum::http::Method::GET, "/health", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["labs"], 2);
}
