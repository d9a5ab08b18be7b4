use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ci_client::{CancellationToken, JobError, JobPoller, PollConfig};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn poller(interval_ms: u64, max_attempts: u32) -> JobPoller {
    JobPoller::new(
        reqwest::Client::new(),
        PollConfig {
            interval: Duration::from_millis(interval_ms),
            max_attempts,
        },
    )
}

async fn ready_on_third(State(hits): State<Hits>) -> (StatusCode, Json<Value>) {
    if hits.bump() < 3 {
        (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"})))
    } else {
        (StatusCode::OK, Json(json!({"graphs": [], "tables": []})))
    }
}

async fn never_ready(State(hits): State<Hits>) -> StatusCode {
    hits.bump();
    StatusCode::INTERNAL_SERVER_ERROR
}

#[tokio::test]
async fn test_first_success_returns_immediately() {
    let hits = Hits::default();
    let base = serve(
        Router::new()
            .route("/result/job-1", get(ready_on_third))
            .with_state(hits.clone()),
    )
    .await;

    let value = poller(5, 20)
        .poll(&format!("{base}/result/job-1"), &CancellationToken::new())
        .await
        .expect("third attempt succeeds");
    assert_eq!(value, json!({"graphs": [], "tables": []}));
    assert_eq!(hits.get(), 3, "no requests after the first success");
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let hits = Hits::default();
    let base = serve(
        Router::new()
            .route("/result/job-1", get(never_ready))
            .with_state(hits.clone()),
    )
    .await;

    let err = poller(1, 20)
        .poll(&format!("{base}/result/job-1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Timeout { attempts: 20 }), "got {err:?}");
    assert_eq!(hits.get(), 20);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let hits = Hits::default();
    let base = serve(
        Router::new()
            .route("/result/job-1", get(never_ready))
            .with_state(hits.clone()),
    )
    .await;

    let token = CancellationToken::new();
    token.cancel();
    let err = poller(1, 20)
        .poll(&format!("{base}/result/job-1"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Cancelled));
    assert_eq!(hits.get(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_sleep() {
    let hits = Hits::default();
    let base = serve(
        Router::new()
            .route("/result/job-1", get(never_ready))
            .with_state(hits.clone()),
    )
    .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = poller(10_000, 20)
        .poll(&format!("{base}/result/job-1"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5), "sleep must not run to completion");
    assert_eq!(hits.get(), 1);
}

#[tokio::test]
async fn test_unparseable_success_is_decode_error() {
    let hits = Hits::default();
    let base = serve(
        Router::new()
            .route(
                "/result/job-1",
                get(|State(hits): State<Hits>| async move {
                    hits.bump();
                    (StatusCode::OK, "definitely not json")
                }),
            )
            .with_state(hits.clone()),
    )
    .await;

    let err = poller(1, 20)
        .poll(&format!("{base}/result/job-1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Decode(_)), "got {err:?}");
    assert_eq!(hits.get(), 1, "decode failures are not retried");
}

#[tokio::test]
async fn test_start_returns_job_id() {
    let base = serve(Router::new().route(
        "/compute",
        post(|| async { (StatusCode::ACCEPTED, Json(json!({"job_id": "abc-123"}))) }),
    ))
    .await;

    let id = poller(1, 1)
        .start(&format!("{base}/compute"), &[], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(id, "abc-123");
}

#[tokio::test]
async fn test_start_failure_carries_backend_detail() {
    let base = serve(Router::new().route(
        "/compute",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "Celonis connection unavailable"})),
            )
        }),
    ))
    .await;

    let err = poller(1, 1)
        .start(&format!("{base}/compute"), &[], &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        JobError::StartFailure { status, message } => {
            assert_eq!(status, Some(500));
            assert_eq!(message, "Celonis connection unavailable");
        }
        other => panic!("expected start failure, got {other:?}"),
    }
}
