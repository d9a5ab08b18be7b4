use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ci_client::{BackendClient, CancellationToken, ClientConfig, JobError, PollConfig};
use ci_console::{GraphSettings, JobEvent, JobMessage, ResultsController, TabContent, TabStatus};
use ci_protocol::{AnalysisFamily, AnalysisVariant, JobHandle, ResourceMetric, SkeletonRelation};
use ci_view::GraphVariant;
use serde_json::{json, Value};

#[derive(Default)]
struct Hits {
    always_before: AtomicUsize,
    equivalence: AtomicUsize,
}

type Shared = Arc<Hits>;

async fn skeleton_start() -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(json!({"job_id": "ls-1"})))
}

async fn always_before(State(hits): State<Shared>, Path(job): Path<String>) -> (StatusCode, Json<Value>) {
    let n = hits.always_before.fetch_add(1, Ordering::SeqCst) + 1;
    if job != "ls-1" || n < 3 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "not ready"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "graphs": [{
                "nodes": [{"id": "register"}, {"id": "approve"}],
                "edges": [
                    {"from": "register", "to": "approve", "label": "3"},
                    {"from": "register", "to": "approve", "label": "5"},
                    {"from": "register", "to": "ghost", "label": "x"}
                ]
            }],
            "tables": []
        })),
    )
}

async fn equivalence(State(hits): State<Shared>) -> (StatusCode, Json<Value>) {
    hits.equivalence.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, Json(json!({"detail": "still running"})))
}

async fn resource_start() -> (StatusCode, Json<Value>) {
    tokio::time::sleep(Duration::from_millis(80)).await;
    (StatusCode::ACCEPTED, Json(json!({"job_id": "rb-1"})))
}

async fn general_information() -> Json<Value> {
    Json(json!({"number_of_cases": 12, "number_of_events": 80}))
}

async fn average_workload(Query(q): Query<HashMap<String, String>>) -> String {
    if q.get("resource").map(String::as_str) == Some("r1") {
        "2.5".to_string()
    } else {
        "0".to_string()
    }
}

async fn controller() -> (ResultsController, Shared) {
    let hits: Shared = Arc::default();
    let app = Router::new()
        .route("/api/log-skeleton/compute-skeleton", post(skeleton_start))
        .route("/api/log-skeleton/get_always_before/:job", get(always_before))
        .route("/api/log-skeleton/get_equivalence/:job", get(equivalence))
        .route("/api/resource-based/compute", post(resource_start))
        .route("/api/general/get-general-information", get(general_information))
        .route(
            "/api/resource-based/resource-profile/average-workload",
            get(average_workload),
        )
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = BackendClient::new(ClientConfig {
        base_url: format!("http://{addr}"),
        request_timeout: Duration::from_secs(5),
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 200,
        },
    })
    .unwrap();
    let settings = GraphSettings {
        directed: true,
        budget: Duration::from_millis(20),
        seed: Some(1),
    };
    (
        ResultsController::new(client, settings, CancellationToken::new()),
        hits,
    )
}

async fn next(controller: &mut ResultsController) -> JobMessage {
    tokio::time::timeout(Duration::from_secs(5), controller.next_message())
        .await
        .expect("no job message within 5s")
        .expect("channel closed")
}

async fn start_skeleton_job(controller: &mut ResultsController) {
    controller.switch_to(AnalysisFamily::LogSkeleton);
    controller.compute().unwrap();
    let message = next(controller).await;
    controller.apply(message).expect("current message");
}

#[tokio::test]
async fn test_variant_before_compute_is_refused() {
    let (mut controller, hits) = controller().await;
    let err = controller
        .select_variant(AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore))
        .unwrap_err();
    assert!(matches!(err, JobError::NoJob(AnalysisFamily::LogSkeleton)));
    assert_eq!(controller.active_family(), AnalysisFamily::LogSkeleton);
    assert_eq!(controller.active_tab().status(), &TabStatus::Idle);
    assert_eq!(hits.always_before.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_compute_then_select_shows_merged_graph() {
    let (mut controller, _) = controller().await;
    controller.switch_to(AnalysisFamily::LogSkeleton);
    controller.compute().unwrap();
    assert_eq!(controller.active_tab().status(), &TabStatus::Starting);

    let ev = next(&mut controller).await;
    let notice = controller.apply(ev).unwrap();
    assert!(notice.text.contains("ls-1"), "{}", notice.text);
    assert_eq!(controller.active_tab().job().unwrap().id(), "ls-1");

    let variant = AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore);
    controller.select_variant(variant).unwrap();
    assert_eq!(controller.active_tab().status(), &TabStatus::Loading(variant));

    let ev = next(&mut controller).await;
    let notice = controller.apply(ev).unwrap();
    assert!(!notice.is_error);
    assert_eq!(controller.active_tab().status(), &TabStatus::Ready);

    let TabContent::Result(view) = controller.active_tab().content() else {
        panic!("expected a result");
    };
    assert_eq!(view.variant, variant);
    assert_eq!(view.graphs.len(), 1);
    let graph = &view.graphs[0].graph;
    assert_eq!(graph.variant, GraphVariant::Directed);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].label(), "3, 5");
    assert_eq!(graph.edges[0].weight(), 2);
}

#[tokio::test]
async fn test_stale_generation_is_dropped() {
    let (mut controller, _) = controller().await;
    start_skeleton_job(&mut controller).await;
    let current = controller.active_tab().generation();

    let stale = JobMessage {
        family: AnalysisFamily::LogSkeleton,
        generation: current - 1,
        event: JobEvent::Failed("late answer".into()),
    };
    assert!(controller.apply(stale).is_none());
    assert_eq!(controller.active_tab().status(), &TabStatus::Ready);

    let fresh = JobMessage {
        family: AnalysisFamily::LogSkeleton,
        generation: current,
        event: JobEvent::Failed("boom".into()),
    };
    let notice = controller.apply(fresh).unwrap();
    assert!(notice.is_error);
    assert_eq!(
        controller.active_tab().status(),
        &TabStatus::Failed("boom".into())
    );
}

#[tokio::test]
async fn test_last_selected_variant_wins() {
    let (mut controller, hits) = controller().await;
    start_skeleton_job(&mut controller).await;

    let slow = AnalysisVariant::LogSkeleton(SkeletonRelation::Equivalence);
    let fast = AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore);
    controller.select_variant(slow).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(hits.equivalence.load(Ordering::SeqCst) > 0);
    controller.select_variant(fast).unwrap();

    let message = next(&mut controller).await;
    match &message.event {
        JobEvent::Loaded(view) => assert_eq!(view.variant, fast),
        other => panic!("unexpected event {other:?}"),
    }
    controller.apply(message).unwrap();
    assert_eq!(controller.active_tab().selected(), Some(fast));
}

#[tokio::test]
async fn test_switching_tabs_cancels_polling() {
    let (mut controller, hits) = controller().await;
    start_skeleton_job(&mut controller).await;

    controller
        .select_variant(AnalysisVariant::LogSkeleton(SkeletonRelation::Equivalence))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(hits.equivalence.load(Ordering::SeqCst) > 0);

    controller.switch_to(AnalysisFamily::TemporalProfile);
    assert_eq!(
        controller.tab(AnalysisFamily::LogSkeleton).status(),
        &TabStatus::Ready
    );

    tokio::time::sleep(Duration::from_millis(30)).await;
    let settled = hits.equivalence.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(hits.equivalence.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn test_general_insights_need_no_job() {
    let (mut controller, _) = controller().await;
    assert!(matches!(
        controller.compute(),
        Err(JobError::Synchronous(AnalysisFamily::GeneralInsights))
    ));

    controller
        .select_variant(AnalysisVariant::GeneralInformation)
        .unwrap();
    let ev = next(&mut controller).await;
    controller.apply(ev).unwrap();

    let TabContent::Result(view) = controller.active_tab().content() else {
        panic!("expected a result");
    };
    assert!(view.graphs.is_empty());
    assert_eq!(view.tables.len(), 1);
    assert_eq!(view.tables[0].headers, vec!["Key", "Value"]);
    assert_eq!(view.tables[0].rows[0], vec!["number_of_cases", "12"]);
}

#[tokio::test]
async fn test_metric_lands_on_resource_tab() {
    let (mut controller, _) = controller().await;
    controller.request_metric(
        ResourceMetric::AverageWorkload,
        vec![("resource".to_string(), "r1".to_string())],
    );
    assert_eq!(controller.active_family(), AnalysisFamily::ResourceBased);

    let ev = next(&mut controller).await;
    let notice = controller.apply(ev).unwrap();
    assert_eq!(notice.text, "average-workload: 2.5");
    match controller.active_tab().content() {
        TabContent::Metric { metric, value } => {
            assert_eq!(*metric, ResourceMetric::AverageWorkload);
            assert_eq!(*value, 2.5);
        }
        other => panic!("unexpected content {other:?}"),
    }
}

#[tokio::test]
async fn test_reset_forgets_jobs_and_results() {
    let (mut controller, _) = controller().await;
    start_skeleton_job(&mut controller).await;
    let variant = AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore);
    controller.select_variant(variant).unwrap();
    let ev = next(&mut controller).await;
    controller.apply(ev).unwrap();
    assert!(matches!(controller.active_tab().content(), TabContent::Result(_)));
    let before = controller.active_tab().generation();

    controller.reset();
    let tab = controller.tab(AnalysisFamily::LogSkeleton);
    assert!(tab.job().is_none());
    assert!(tab.selected().is_none());
    assert!(matches!(tab.content(), TabContent::Empty));
    assert_eq!(tab.status(), &TabStatus::Idle);
    assert!(tab.generation() > before);

    let err = controller.select_variant(variant).unwrap_err();
    assert!(matches!(err, JobError::NoJob(AnalysisFamily::LogSkeleton)));
}

#[tokio::test]
async fn test_reset_drops_job_started_for_previous_log() {
    let (mut controller, _) = controller().await;
    controller.switch_to(AnalysisFamily::LogSkeleton);
    controller.compute().unwrap();
    let generation = controller.active_tab().generation();
    controller.reset();
    assert_eq!(controller.active_tab().status(), &TabStatus::Idle);

    let late = JobMessage {
        family: AnalysisFamily::LogSkeleton,
        generation,
        event: JobEvent::Started(JobHandle::new("old-log-job", AnalysisFamily::LogSkeleton)),
    };
    assert!(controller.apply(late).is_none());
    assert!(controller.active_tab().job().is_none());
}

#[tokio::test]
async fn test_metric_does_not_cancel_computation() {
    let (mut controller, _) = controller().await;
    controller.switch_to(AnalysisFamily::ResourceBased);
    controller.compute().unwrap();
    controller.request_metric(
        ResourceMetric::AverageWorkload,
        vec![("resource".to_string(), "r1".to_string())],
    );
    assert_eq!(controller.active_tab().status(), &TabStatus::Starting);

    for _ in 0..2 {
        let message = next(&mut controller).await;
        controller.apply(message).expect("both answers are current");
    }
    let tab = controller.active_tab();
    assert_eq!(tab.job().unwrap().id(), "rb-1");
    assert_eq!(tab.status(), &TabStatus::Ready);
    assert!(matches!(tab.content(), TabContent::Metric { .. }));
}

#[tokio::test]
async fn test_newer_metric_supersedes_older() {
    let (mut controller, _) = controller().await;
    let params = vec![("resource".to_string(), "r1".to_string())];
    controller.request_metric(ResourceMetric::AverageWorkload, params.clone());
    let first = controller.active_tab().metric_generation();
    controller.request_metric(ResourceMetric::AverageWorkload, params);
    assert_eq!(controller.active_tab().metric_generation(), first + 1);

    let stale = JobMessage {
        family: AnalysisFamily::ResourceBased,
        generation: first,
        event: JobEvent::Metric(ResourceMetric::AverageWorkload, 99.0),
    };
    assert!(controller.apply(stale).is_none());
}
