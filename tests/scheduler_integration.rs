//! End-to-end scheduler scenarios
//!
//! A real ticker drives real dispatches against a wiremock server standing
//! in for the callout targets. Each scenario asserts on the requests the
//! target actually received: methods, paths, headers and counts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{event_targeting, run_once_schedule, schedule};
use metronome::models::Schedule;
use metronome::scheduler::{EventExecutor, ScheduleRegistry, Ticker};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn harness(tick_millis: u64) -> (Ticker, Arc<ScheduleRegistry>) {
    let registry = Arc::new(ScheduleRegistry::new());
    let executor = Arc::new(EventExecutor::new(Duration::from_secs(2)).unwrap());
    let ticker = Ticker::new(
        registry.clone(),
        executor,
        Duration::from_millis(tick_millis),
    );
    (ticker, registry)
}

async fn mock_target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    server
}

/// Scenario: a repeating schedule posts on every frequency step.
#[tokio::test]
async fn repeating_schedule_fires_repeatedly() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    registry
        .add_schedule(schedule("s1", "every-second", "PT1S"))
        .await
        .unwrap();
    registry
        .add_schedule_event(event_targeting(
            "e1",
            "post-ping",
            "every-second",
            &target.uri(),
            "POST",
            "/p",
        ))
        .await
        .unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(2700)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert!(
        requests.len() >= 2,
        "expected at least two callouts, got {}",
        requests.len()
    );
    for request in &requests {
        assert_eq!(request.method.as_str(), "POST");
        assert_eq!(request.url.path(), "/p");
        assert_eq!(
            request
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }
}

/// Scenario: a run-once schedule fires exactly once, then leaves the queue.
#[tokio::test]
async fn run_once_schedule_fires_exactly_once() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    let mut once = run_once_schedule("s2", "one-shot");
    once.frequency = Some("PT1S".to_string());
    registry.add_schedule(once).await.unwrap();
    registry
        .add_schedule_event(event_targeting(
            "e2",
            "single-ping",
            "one-shot",
            &target.uri(),
            "POST",
            "/once",
        ))
        .await
        .unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "run-once must fire exactly once");
    assert_eq!(registry.stats().await.queue_length, 0);
}

/// Scenario: a schedule whose end has already passed is inserted but never
/// dispatches.
#[tokio::test]
async fn expired_schedule_retires_without_dispatch() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    let expired = Schedule {
        id: "s3".to_string(),
        name: "expired".to_string(),
        frequency: Some("PT1S".to_string()),
        end: Some("20180101T000000".to_string()),
        ..Default::default()
    };
    registry.add_schedule(expired).await.unwrap();
    registry
        .add_schedule_event(event_targeting(
            "e3",
            "never-ping",
            "expired",
            &target.uri(),
            "POST",
            "/never",
        ))
        .await
        .unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert!(requests.is_empty(), "expired schedule must not dispatch");
    assert_eq!(registry.stats().await.queue_length, 0);
}

/// Scenario: an invalid HTTP method is logged and skipped; the context keeps
/// its place in the rotation.
#[tokio::test]
async fn invalid_method_issues_no_request_but_keeps_schedule_alive() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    registry
        .add_schedule(schedule("s5", "zapper", "PT1S"))
        .await
        .unwrap();
    registry
        .add_schedule_event(event_targeting(
            "e5",
            "zap-ping",
            "zapper",
            &target.uri(),
            "ZAP",
            "/zap",
        ))
        .await
        .unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(2300)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert!(requests.is_empty(), "invalid method must not reach the wire");
    // Still requeued: a bad event does not retire its schedule.
    assert_eq!(registry.stats().await.queue_length, 1);
}

/// Boundary: one bad event must not stop the context's other events.
#[tokio::test]
async fn bad_method_does_not_block_other_events() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    let mut once = run_once_schedule("s5b", "mixed");
    once.frequency = Some("PT1S".to_string());
    registry.add_schedule(once).await.unwrap();
    registry
        .add_schedule_event(event_targeting(
            "bad",
            "bad-ping",
            "mixed",
            &target.uri(),
            "ZAP",
            "/bad",
        ))
        .await
        .unwrap();
    registry
        .add_schedule_event(event_targeting(
            "good",
            "good-ping",
            "mixed",
            &target.uri(),
            "PUT",
            "/good",
        ))
        .await
        .unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method.as_str(), "PUT");
    assert_eq!(requests[0].url.path(), "/good");
}

/// Scenario: non-empty parameters ride along as the JSON body, with
/// `Content-Length` matching their byte length.
#[tokio::test]
async fn parameters_are_sent_with_matching_content_length() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    registry
        .add_schedule(run_once_schedule("s6", "with-params"))
        .await
        .unwrap();

    let parameters = r#"{"k":1}"#;
    let mut event = event_targeting(
        "e6",
        "param-ping",
        "with-params",
        &target.uri(),
        "POST",
        "/params",
    );
    event.parameters = parameters.to_string();
    registry.add_schedule_event(event).await.unwrap();

    ticker.start();
    tokio::time::sleep(Duration::from_millis(400)).await;
    ticker.stop().await;

    let requests = target.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(
        request
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok()),
        Some(parameters.len().to_string().as_str())
    );
    assert_eq!(request.body, parameters.as_bytes());
}

/// Events attached to a schedule removed mid-run stop firing.
#[tokio::test]
async fn removed_schedule_stops_firing() {
    let target = mock_target().await;
    let (ticker, registry) = harness(100);

    registry
        .add_schedule(schedule("s7", "short-lived", "PT1S"))
        .await
        .unwrap();
    registry
        .add_schedule_event(event_targeting(
            "e7",
            "short-ping",
            "short-lived",
            &target.uri(),
            "POST",
            "/short",
        ))
        .await
        .unwrap();

    ticker.start();
    // Let it fire once, then remove.
    tokio::time::sleep(Duration::from_millis(1300)).await;
    registry.remove_schedule("s7").await.unwrap();
    let fired_before_removal = target.received_requests().await.unwrap().len();

    tokio::time::sleep(Duration::from_millis(1300)).await;
    ticker.stop().await;

    let fired_total = target.received_requests().await.unwrap().len();
    assert_eq!(
        fired_total, fired_before_removal,
        "no dispatches after removal"
    );
    assert_eq!(registry.stats().await.queue_length, 0);
}
