// tests/status_http.rs

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use tower::ServiceExt; // for `oneshot`

use social_listening::api::{self, AppState};
use social_listening::cycle::CycleOutcome;
use social_listening::scheduler::StatusBoard;

fn router_with_one_completed_cycle() -> Router {
    let board = StatusBoard::new();
    board.record_outcome(
        "hackernews",
        &CycleOutcome::Completed {
            examined: 12,
            matched: 2,
            sent: 2,
            replayed: 0,
            cursor: "38001234".into(),
        },
    );
    api::create_router(AppState {
        board,
        started: Utc::now(),
    })
}

#[tokio::test]
async fn health_answers_ok() {
    let app = router_with_one_completed_cycle();
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_reports_adapter_cursor_and_counts() {
    let app = router_with_one_completed_cycle();
    let resp = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let hn = &body["adapters"]["hackernews"];
    assert_eq!(hn["cursor"], "38001234");
    assert_eq!(hn["cycles"], 1);
    assert_eq!(hn["matched_total"], 2);
    assert!(hn["last_error"].is_null());
}
