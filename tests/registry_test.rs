//! Registry invariant tests
//!
//! These exercise the cross-reference invariants of the schedule registry
//! through its public surface: every event reachable through the indices,
//! id and name indices agreeing, relocation leaving no dangling entries,
//! and the queue behaviors around tombstones and completion.

mod common;

use chrono::{Duration, Utc};
use common::{run_once_schedule, schedule};
use metronome::models::{Addressable, ScheduleEvent};
use metronome::scheduler::{ScheduleRegistry, SchedulerError};

fn event(id: &str, name: &str, schedule: &str) -> ScheduleEvent {
    ScheduleEvent {
        id: id.to_string(),
        name: name.to_string(),
        schedule: schedule.to_string(),
        service: "core-data".to_string(),
        addressable: Addressable {
            name: format!("schedule-{}", name),
            protocol: "http".to_string(),
            address: "localhost".to_string(),
            port: 9999,
            path: "/cb".to_string(),
            http_method: "POST".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

// ============================================================================
// Index Invariants
// ============================================================================

#[tokio::test]
async fn every_event_is_reachable_through_its_indices() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s1", "hourly", "PT1H")).await.unwrap();
    registry.add_schedule(schedule("s2", "daily", "PT24H")).await.unwrap();

    for (id, name, owner) in [
        ("e1", "purge", "hourly"),
        ("e2", "report", "hourly"),
        ("e3", "backup", "daily"),
    ] {
        registry.add_schedule_event(event(id, name, owner)).await.unwrap();
    }

    for (id, name, owner) in [
        ("e1", "purge", "hourly"),
        ("e2", "report", "hourly"),
        ("e3", "backup", "daily"),
    ] {
        let by_id = registry.query_schedule_event(id).await.unwrap();
        let by_name = registry.query_schedule_event_by_name(name).await.unwrap();

        assert_eq!(by_id.id, id);
        assert_eq!(by_name.id, id);
        assert_eq!(by_id.schedule, owner);
        assert_eq!(by_name.schedule, owner);
    }
}

#[tokio::test]
async fn id_and_name_indices_agree() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s1", "hourly", "PT1H")).await.unwrap();

    let by_id = registry.query_schedule("s1").await.unwrap();
    let by_name = registry.query_schedule_by_name("hourly").await.unwrap();

    assert_eq!(by_id.id, by_name.id);
    assert_eq!(by_id.name, by_name.name);
}

#[tokio::test]
async fn add_schedule_is_idempotent_on_id() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s1", "hourly", "PT1H")).await.unwrap();
    registry.add_schedule(schedule("s1", "hourly", "PT1H")).await.unwrap();

    let stats = registry.stats().await;
    assert_eq!(stats.schedules, 1);
    assert_eq!(stats.queue_length, 1);
}

// ============================================================================
// Relocation
// ============================================================================

#[tokio::test]
async fn relocated_event_is_reachable_exactly_once() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s4", "old-owner", "PT1H")).await.unwrap();
    registry.add_schedule(schedule("s4b", "new-owner", "PT1H")).await.unwrap();
    registry.add_schedule_event(event("e4a", "mover", "old-owner")).await.unwrap();

    registry
        .update_schedule_event(event("e4a", "mover", "new-owner"))
        .await
        .unwrap();

    // Reachable only via the new schedule.
    assert_eq!(
        registry.query_schedule_event("e4a").await.unwrap().schedule,
        "new-owner"
    );
    assert_eq!(
        registry
            .query_schedule_event_by_name("mover")
            .await
            .unwrap()
            .schedule,
        "new-owner"
    );

    // The orphaned old owner is gone from both schedule indices; no
    // dangling name entry survives.
    assert!(matches!(
        registry.query_schedule("s4").await,
        Err(SchedulerError::NotFound { .. })
    ));
    assert!(matches!(
        registry.query_schedule_by_name("old-owner").await,
        Err(SchedulerError::NotFound { .. })
    ));
}

// ============================================================================
// Queue Behaviors
// ============================================================================

#[tokio::test]
async fn tombstoned_context_is_never_handed_out_for_dispatch() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(run_once_schedule("s1", "doomed")).await.unwrap();
    registry.remove_schedule("s1").await.unwrap();

    let due = registry.collect_due(Utc::now() + Duration::hours(1)).await;
    assert!(due.is_empty());
    assert_eq!(registry.stats().await.queue_length, 0);
}

#[tokio::test]
async fn consecutive_fire_times_step_by_at_least_the_frequency() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s1", "every-10s", "PT10S")).await.unwrap();

    let due = registry.collect_due(Utc::now() + Duration::seconds(11)).await;
    let context = due.into_iter().next().expect("schedule should be due");

    let mut previous = context.next_fire_time().expect("live context");
    for _ in 0..5 {
        let complete = context.advance(Utc::now());
        assert!(!complete);
        let next = context.next_fire_time().expect("still live");
        assert!(next - previous >= Duration::seconds(10));
        previous = next;
    }
}

#[tokio::test]
async fn removal_during_in_flight_dispatch_keeps_indices_clean() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(schedule("s1", "victim", "PT10S")).await.unwrap();
    registry.add_schedule_event(event("e1", "payload", "victim")).await.unwrap();

    // Simulate the ticker pulling the context for dispatch.
    let due = registry.collect_due(Utc::now() + Duration::seconds(11)).await;
    let context = due.into_iter().next().expect("due context");

    // Writer removes the schedule while the dispatch is in flight.
    registry.remove_schedule("s1").await.unwrap();

    // The dispatch finishes; the context must not be re-enqueued and the
    // indices must stay clean.
    let complete = context.advance(Utc::now());
    registry.finish_dispatch(context, complete).await;

    assert_eq!(registry.stats().await.queue_length, 0);
    assert!(registry.query_schedule("s1").await.is_err());
    assert!(registry.query_schedule_by_name("victim").await.is_err());
    assert!(registry.query_schedule_event("e1").await.is_err());
    assert!(registry.query_schedule_event_by_name("payload").await.is_err());
}

#[tokio::test]
async fn event_added_before_next_tick_is_visible_to_it() {
    let registry = ScheduleRegistry::new();
    registry.add_schedule(run_once_schedule("s1", "soon")).await.unwrap();
    registry.add_schedule_event(event("e1", "late", "soon")).await.unwrap();

    let due = registry.collect_due(Utc::now() + Duration::seconds(1)).await;
    let context = due.into_iter().next().expect("due context");

    let events = context.events_snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "e1");
}
