//! Web API Booking Tests
//!
//! Integration tests for availability, creation, rescheduling and
//! cancellation of lab bookings.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{bearer, spawn_app, TestApp};

/// Create a booking and return the response body.
async fn book(app: &TestApp, token: &str, start: &str, end: &str) -> (StatusCode, Value) {
    let response = app
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({
            "title": "Practical session",
            "startTime": start,
            "endTime": end
        }))
        .await;
    (response.status_code(), response.json())
}

// ============================================================================
// Creation Tests
// ============================================================================

#[tokio::test]
async fn test_overlapping_booking_rejected_back_to_back_allowed() {
    let app = spawn_app().await;
    let (ada, ada_token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, alan_token) = app.user_token("alan@uni.example", "Alan", "Turing").await;

    let (status, body) = book(&app, &ada_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
    let first = &body["data"];
    assert_eq!(first["ownerId"], ada);
    assert_eq!(first["status"], "confirmed");
    assert_eq!(first["resource"], "main-lab");
    assert_eq!(first["startTime"], "2024-06-14T10:00:00Z");

    let (status, body) = book(&app, &alan_token, "2024-06-14T10:30:00Z", "2024-06-14T11:30:00Z").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    let conflicts = body["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["id"], first["id"]);

    let (status, _) = book(&app, &alan_token, "2024-06-14T11:00:00Z", "2024-06-14T12:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_same_slot_in_other_lab_allowed() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    book(&app, &token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;

    let response = app
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "resource": "chem-lab",
            "title": "Titration",
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["resource"], "chem-lab");
}

#[tokio::test]
async fn test_create_invalid_interval() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    let (status, body) = book(&app, &token, "2024-06-14T11:00:00Z", "2024-06-14T11:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Start time must be before end time");

    let (status, _) = book(&app, &token, "2024-06-14T12:00:00Z", "2024-06-14T11:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_empty_title() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    let response = app
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "   ",
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z"
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["details"]["title"].is_array());
}

#[tokio::test]
async fn test_deleted_user_token_cannot_create_booking() {
    let app = spawn_app().await;
    let (ada, ada_token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let admin_token = app.admin_token().await;

    app.server
        .delete(&format!("/users/{}", ada))
        .add_header(AUTHORIZATION, bearer(&admin_token))
        .await
        .assert_status_ok();

    // The session token is still valid but its account is gone
    let (status, body) = book(&app, &ada_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let listed: Value = app
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&admin_token))
        .await
        .json();
    assert_eq!(listed["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_unknown_attendee() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let grace = app.register("grace@uni.example", "Grace", "Hopper").await;

    let response = app
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Group work",
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z",
            "attendees": [grace, 9999]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Unknown attendees: 9999");

    let response = app
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Group work",
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z",
            "attendees": [grace, grace]
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["attendees"], json!([grace]));
}

#[tokio::test]
async fn test_bookings_require_token() {
    let app = spawn_app().await;

    app.server
        .get("/bookings")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/bookings")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Availability Tests
// ============================================================================

#[tokio::test]
async fn test_availability_reports_conflicts() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    let response = app
        .server
        .get("/bookings/availability")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("start", "2024-06-14T10:30:00Z")
        .add_query_param("end", "2024-06-14T11:30:00Z")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["available"], true);

    let (_, created) = book(&app, &token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;

    let response = app
        .server
        .get("/bookings/availability")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("start", "2024-06-14T10:30:00Z")
        .add_query_param("end", "2024-06-14T11:30:00Z")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["available"], false);
    let conflicts = body["data"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["id"], created["data"]["id"]);

    // Excluding the booking itself, as a reschedule would
    let response = app
        .server
        .get("/bookings/availability")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("start", "2024-06-14T10:30:00Z")
        .add_query_param("end", "2024-06-14T11:30:00Z")
        .add_query_param("exclude", created["data"]["id"].as_i64().unwrap())
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["available"], true);
}

#[tokio::test]
async fn test_availability_bad_query() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    let response = app
        .server
        .get("/bookings/availability")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("start", "yesterday")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .get("/bookings/availability")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("start", "2024-06-14T12:00:00Z")
        .add_query_param("end", "2024-06-14T10:00:00Z")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Reschedule Tests
// ============================================================================

#[tokio::test]
async fn test_reschedule_to_same_interval_succeeds() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, created) = book(&app, &token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    let id = created["data"]["id"].as_i64().unwrap();

    let response = app
        .server
        .patch(&format!("/bookings/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z",
            "title": "Renamed practical"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "Renamed practical");
    assert_eq!(body["data"]["startTime"], "2024-06-14T10:00:00Z");
}

#[tokio::test]
async fn test_reschedule_into_taken_slot() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, first) = book(&app, &token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    let (_, second) = book(&app, &token, "2024-06-14T12:00:00Z", "2024-06-14T13:00:00Z").await;

    let response = app
        .server
        .patch(&format!("/bookings/{}", second["data"]["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "startTime": "2024-06-14T10:45:00Z", "endTime": "2024-06-14T11:45:00Z" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["conflicts"][0]["id"], first["data"]["id"]);

    // The failed move left the booking where it was
    let response = app
        .server
        .get(&format!("/bookings/{}", second["data"]["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["startTime"], "2024-06-14T12:00:00Z");
}

#[tokio::test]
async fn test_reschedule_by_other_user_forbidden() {
    let app = spawn_app().await;
    let (_, ada_token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, alan_token) = app.user_token("alan@uni.example", "Alan", "Turing").await;
    let (_, created) = book(&app, &ada_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    let path = format!("/bookings/{}", created["data"]["id"]);

    app.server
        .patch(&path)
        .add_header(AUTHORIZATION, bearer(&alan_token))
        .json(&json!({ "title": "Hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .delete(&path)
        .add_header(AUTHORIZATION, bearer(&alan_token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_may_edit_any_booking() {
    let app = spawn_app().await;
    let (_, ada_token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let admin_token = app.admin_token().await;
    let (_, created) = book(&app, &ada_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;

    let response = app
        .server
        .patch(&format!("/bookings/{}", created["data"]["id"]))
        .add_header(AUTHORIZATION, bearer(&admin_token))
        .json(&json!({ "startTime": "2024-06-14T14:00:00Z", "endTime": "2024-06-14T15:00:00Z" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["startTime"], "2024-06-14T14:00:00Z");
    assert_eq!(body["data"]["ownerId"], created["data"]["ownerId"]);
}

#[tokio::test]
async fn test_missing_booking() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;

    app.server
        .get("/bookings/4242")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .post("/bookings/4242/cancel")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Cancellation and Listing Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_is_idempotent_and_frees_slot() {
    let app = spawn_app().await;
    let (_, ada_token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, alan_token) = app.user_token("alan@uni.example", "Alan", "Turing").await;
    let (_, created) = book(&app, &ada_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    let id = created["data"]["id"].as_i64().unwrap();

    for _ in 0..2 {
        let response = app
            .server
            .post(&format!("/bookings/{}/cancel", id))
            .add_header(AUTHORIZATION, bearer(&ada_token))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "cancelled");
    }

    // Editing a cancelled booking is refused
    app.server
        .patch(&format!("/bookings/{}", id))
        .add_header(AUTHORIZATION, bearer(&ada_token))
        .json(&json!({ "title": "Revived" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    // The slot is free again
    let (status, _) = book(&app, &alan_token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_hides_cancelled_by_default() {
    let app = spawn_app().await;
    let (ada, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    let (_, late) = book(&app, &token, "2024-06-14T15:00:00Z", "2024-06-14T16:00:00Z").await;
    let (_, early) = book(&app, &token, "2024-06-14T09:00:00Z", "2024-06-14T10:00:00Z").await;

    app.server
        .delete(&format!("/bookings/{}", late["data"]["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();

    let response = app
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], early["data"]["id"]);

    let response = app
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("include_cancelled", true)
        .add_query_param("owner", ada)
        .await;
    let body: Value = response.json();
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    // Ordered by start time
    assert_eq!(listed[0]["id"], early["data"]["id"]);
    assert_eq!(listed[1]["status"], "cancelled");
}

#[tokio::test]
async fn test_list_by_range() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ada@uni.example", "Ada", "Lovelace").await;
    book(&app, &token, "2024-06-13T10:00:00Z", "2024-06-13T11:00:00Z").await;
    let (_, inside) = book(&app, &token, "2024-06-14T10:00:00Z", "2024-06-14T11:00:00Z").await;

    let response = app
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("from", "2024-06-14T00:00:00Z")
        .add_query_param("to", "2024-06-15T00:00:00Z")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], inside["data"]["id"]);

    app.server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("from", "2024-06-15T00:00:00Z")
        .add_query_param("to", "2024-06-14T00:00:00Z")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
