// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use newsdesk::config::AppConfig;

// Full in-process app, same wiring as the binary minus file/env config.
fn build_app() -> Router {
    newsdesk::build_app(AppConfig::default()).expect("build_app should build Router in tests")
}

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn ingest_counters_show_up_after_a_webhook_batch() {
    let app = build_app();

    let payload = json!({
        "items": [
            { "title": "Metrics rule", "published_date": "2025-01-10" },
            { "title": "Metrics rule", "published_date": "2025-01-10" },
            { "summary": "no title" }
        ]
    });
    let resp = app
        .clone()
        .oneshot(
            Request::post("/api/policy-news/webhook")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let text = scrape(&app).await;
    for needle in [
        "ingest_items_total",
        "ingest_saved_total",
        "ingest_failed_total",
        "ingest_duplicates_total",
        "topics_window_days",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}

#[tokio::test]
async fn building_the_app_twice_reuses_the_recorder() {
    let a = build_app();
    let b = build_app();
    assert!(scrape(&a).await.contains("topics_window_days"));
    assert!(scrape(&b).await.contains("topics_window_days"));
}
