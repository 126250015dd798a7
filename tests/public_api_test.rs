//! Public JSON endpoints, served by the actix test harness over `MemoryStore`.

mod common;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use serde_json::{Value, json};
use talkback::routes;
use common::*;

macro_rules! public_app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($h.briefing.clone()))
                .app_data(routes::json_config())
                .configure(routes::public_api),
        )
        .await
    };
}

// ============================================================================
// READ
// ============================================================================

#[actix_rt::test]
async fn test_public_read_returns_briefing_and_status() {
    let h = harness();
    let p = h.store.insert("Rust 101", "Beginners", "Ownership");
    let app = public_app!(h);

    let req = test::TestRequest::get()
        .uri(&format!("/api/p/{}", p.access_code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["presentation"]["title"], "Rust 101");
    assert_eq!(body["presentation"]["content"], "Ownership");
    assert_eq!(body["ai_content"], "# Briefing 1\n");
    assert_eq!(body["processing"]["scheduled"], false);
    assert!(body["processing"]["next_update"].is_null());
    assert_eq!(body["refresh_interval"], 20);
}

#[actix_rt::test]
async fn test_public_read_unknown_code() {
    let h = harness();
    let app = public_app!(h);

    let req = test::TestRequest::get().uri("/api/p/deadbeef").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(h.generator.calls(), 0);
}

// ============================================================================
// FEEDBACK
// ============================================================================

#[actix_rt::test]
async fn test_submit_feedback_schedules_regeneration() {
    let h = harness();
    let p = h.store.insert("Rust 101", "", "Ownership");
    let app = public_app!(h);

    let req = test::TestRequest::post()
        .uri(&format!("/p/{}/feedback", p.access_code))
        .set_json(json!({ "feedback": "Can you explain Rc?" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["processing"], true);
    assert!(body["next_update"].is_string());
    assert_eq!(h.store.unprocessed_count(p.id), 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/p/{}", p.access_code))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["processing"]["scheduled"], true);
    assert!(body["processing"]["next_update"].is_string());
}

#[actix_rt::test]
async fn test_submit_feedback_rejects_invalid_input() {
    let h = harness();
    let p = h.store.insert("Rust 101", "", "Ownership");
    let app = public_app!(h);

    let cases = [
        (format!("/p/{}/feedback", p.access_code), json!({ "feedback": "   " })),
        (format!("/p/{}/feedback", p.access_code), json!({ "feedback": "y".repeat(1001) })),
        ("/p/unknown/feedback".to_string(), json!({ "feedback": "hello" })),
        (format!("/p/{}/feedback", p.access_code), json!({ "comment": "wrong field" })),
    ];

    for (uri, payload) in cases {
        let req = test::TestRequest::post().uri(&uri).set_json(payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    assert!(h.store.feedback(p.id).is_empty());
    assert!(!h.store.get(p.id).processing_scheduled);
}

#[actix_rt::test]
async fn test_submit_feedback_requires_json_content_type() {
    let h = harness();
    let p = h.store.insert("Rust 101", "", "Ownership");
    let app = public_app!(h);

    let req = test::TestRequest::post()
        .uri(&format!("/p/{}/feedback", p.access_code))
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload("feedback=hello")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Content-Type must be application/json");
    assert!(h.store.feedback(p.id).is_empty());
}
