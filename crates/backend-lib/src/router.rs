// ============================
// labpass-backend/src/router.rs
// ============================
//! Route table.
use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, auth, lab, student};
use crate::middleware::rate_limit;
use crate::AppState;

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/identity", post(auth::identity))
        .route("/auth/logout", post(auth::logout))
        .route("/lab/login", post(auth::lab_login))
        .route("/lab/keynote", get(lab::keynote_page))
        .route("/lab/{lab}", get(lab::booth_page))
        .route("/lab/{lab}/talk", get(lab::talk_page))
        .route("/student", get(student::checklist))
        .route("/student/register", post(student::register))
        .route("/student/lab/{lab}", get(student::lab_page))
        .route("/student/seminar", get(student::seminar_page))
        .route("/student/code_check", post(student::code_check))
        .route("/student/seminar_check", post(student::seminar_check))
        .route("/student/done", get(student::done))
        .route("/admin/labs", get(admin::list_labs).post(admin::add_lab))
        .route("/admin/labs/{lab}", delete(admin::remove_lab))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "labs": state.catalog.list().len(),
        "active": state.registry.active_labs(),
        "countdown": state.booth_clock.remaining(),
    }))
}
