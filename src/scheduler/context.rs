//! Live schedule contexts
//!
//! A [`ScheduleContext`] is the runtime object the registry keeps per
//! schedule: the schedule itself, its parsed recurrence, the events bound to
//! it, and the firing state. Contexts are shared as [`ContextHandle`]s
//! between the registry indices, the dispatch queue and in-flight
//! dispatches; every field sits behind the context's own short-lived lock so
//! a dispatch can advance the firing state without touching the registry
//! lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::SchedulerResult;
use super::recurrence::{Evaluation, Recurrence};
use crate::models::{Schedule, ScheduleEvent};

/// Shared handle to a live context.
pub type ContextHandle = Arc<ScheduleContext>;

/// Mutable state of one schedule, guarded by the context lock.
struct ContextState {
    schedule: Schedule,
    recurrence: Recurrence,
    events: HashMap<String, ScheduleEvent>,

    /// Next instant to fire; `None` once the recurrence is exhausted.
    next_fire_time: Option<DateTime<Utc>>,
    iteration_count: u32,

    /// Tombstone set by `remove_schedule`; observed lazily by the ticker.
    marked_deleted: bool,

    // Queue membership, maintained only under the registry lock. Both false
    // while a context is retired; `in_flight` covers the dispatch window
    // between dequeue and requeue.
    in_queue: bool,
    in_flight: bool,
}

/// The live runtime object owned by the registry, one per schedule.
pub struct ScheduleContext {
    state: Mutex<ContextState>,
}

impl ScheduleContext {
    /// Create a context for a schedule and prime its first fire time.
    pub fn new(schedule: Schedule, now: DateTime<Utc>) -> SchedulerResult<Self> {
        let recurrence = Recurrence::from_schedule(&schedule)?;
        let next_fire_time = recurrence.prime(now).next_fire_time();

        Ok(Self {
            state: Mutex::new(ContextState {
                schedule,
                recurrence,
                events: HashMap::new(),
                next_fire_time,
                iteration_count: 0,
                marked_deleted: false,
                in_queue: false,
                in_flight: false,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        // A dispatch that panicked mid-update must not wedge the registry.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the embedded schedule and re-prime against the wall clock.
    ///
    /// Events, tombstone and queue membership are untouched; the iteration
    /// count restarts. Fails without mutating when the new recurrence does
    /// not parse.
    pub fn reset(&self, schedule: Schedule, now: DateTime<Utc>) -> SchedulerResult<()> {
        let recurrence = Recurrence::from_schedule(&schedule)?;
        let mut state = self.state();
        state.next_fire_time = recurrence.prime(now).next_fire_time();
        state.schedule = schedule;
        state.recurrence = recurrence;
        state.iteration_count = 0;
        Ok(())
    }

    /// Re-prime a retired context so it can re-enter the queue.
    pub fn reprime(&self, now: DateTime<Utc>) {
        let mut state = self.state();
        state.next_fire_time = state.recurrence.prime(now).next_fire_time();
        state.iteration_count = 0;
    }

    /// Advance past a firing that just finished. Returns true when the
    /// recurrence is exhausted and the context must be retired.
    pub fn advance(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state();
        let previous = state.next_fire_time.unwrap_or(now);
        let iterations = state.iteration_count + 1;

        let evaluation = state.recurrence.advance(previous, iterations);
        state.next_fire_time = evaluation.next_fire_time();
        state.iteration_count = iterations;
        evaluation.is_complete()
    }

    /// Copy of the embedded schedule.
    pub fn schedule(&self) -> Schedule {
        self.state().schedule.clone()
    }

    pub fn schedule_id(&self) -> String {
        self.state().schedule.id.clone()
    }

    pub fn schedule_name(&self) -> String {
        self.state().schedule.name.clone()
    }

    /// Event lookup by id.
    pub fn event(&self, event_id: &str) -> Option<ScheduleEvent> {
        self.state().events.get(event_id).cloned()
    }

    /// Copy of all bound events, in no particular order.
    pub fn events_snapshot(&self) -> Vec<ScheduleEvent> {
        self.state().events.values().cloned().collect()
    }

    /// Ids of all bound events.
    pub fn event_ids(&self) -> Vec<String> {
        self.state().events.keys().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.state().events.len()
    }

    pub fn insert_event(&self, event: ScheduleEvent) {
        self.state().events.insert(event.id.clone(), event);
    }

    pub fn remove_event(&self, event_id: &str) -> Option<ScheduleEvent> {
        self.state().events.remove(event_id)
    }

    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.state().next_fire_time
    }

    pub fn iteration_count(&self) -> u32 {
        self.state().iteration_count
    }

    /// Due for dispatch at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state().next_fire_time, Some(at) if at <= now)
    }

    /// Recurrence exhausted; nothing left to fire.
    pub fn is_retired(&self) -> bool {
        self.state().next_fire_time.is_none()
    }

    pub fn mark_deleted(&self) {
        self.state().marked_deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.state().marked_deleted
    }

    pub(crate) fn set_in_queue(&self, value: bool) {
        self.state().in_queue = value;
    }

    pub(crate) fn set_in_flight(&self, value: bool) {
        self.state().in_flight = value;
    }

    /// True while the context sits in the queue or is being dispatched.
    pub(crate) fn is_scheduled(&self) -> bool {
        let state = self.state();
        state.in_queue || state.in_flight
    }

    /// One-line description for log output.
    pub fn describe(&self) -> String {
        let state = self.state();
        format!(
            "{}, events: {}, iterations: {}, next: {}",
            state.schedule.describe(),
            state.events.len(),
            state.iteration_count,
            state
                .next_fire_time
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "retired".to_string()),
        )
    }
}
