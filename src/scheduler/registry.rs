//! Schedule registry
//!
//! The indexed in-memory store of schedules, events and their
//! cross-references. Five forward mappings keep every customer-facing lookup
//! O(1):
//!
//! ```text
//! schedule-id   ──► ScheduleContext ◄── schedule-name
//! event-id      ──► schedule-id
//! event-name    ──► schedule-id
//! event-name    ──► event-id
//! ```
//!
//! All indices and the dispatch queue live behind one exclusive lock; write
//! traffic is low and the cross-index invariants make per-map locking
//! fragile. The lock is a leaf: nothing is awaited while it is held, and
//! dispatches mutate only their own context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::context::{ContextHandle, ScheduleContext};
use super::error::{SchedulerError, SchedulerResult};
use super::queue::DispatchQueue;
use crate::models::{Schedule, ScheduleEvent};

// ============================================================================
// Registry
// ============================================================================

struct RegistryInner {
    by_id: HashMap<String, ContextHandle>,
    by_name: HashMap<String, ContextHandle>,
    event_to_schedule: HashMap<String, String>,
    event_name_to_schedule: HashMap<String, String>,
    event_name_to_event: HashMap<String, String>,
    queue: DispatchQueue,
}

impl RegistryInner {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            event_to_schedule: HashMap::new(),
            event_name_to_schedule: HashMap::new(),
            event_name_to_event: HashMap::new(),
            queue: DispatchQueue::new(),
        }
    }

    fn index_event(&mut self, event: &ScheduleEvent, schedule_id: &str) {
        self.event_to_schedule
            .insert(event.id.clone(), schedule_id.to_string());
        self.event_name_to_schedule
            .insert(event.name.clone(), schedule_id.to_string());
        self.event_name_to_event
            .insert(event.name.clone(), event.id.clone());
    }

    fn unindex_event_name(&mut self, event_name: &str) {
        self.event_name_to_schedule.remove(event_name);
        self.event_name_to_event.remove(event_name);
    }

    /// Put a live, unscheduled context back onto the queue.
    fn promote(&mut self, context: &ContextHandle) {
        if !context.is_retired() && !context.is_scheduled() {
            self.queue.enqueue(context.clone());
        }
    }
}

/// Registry statistics, exposed over the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub schedules: usize,
    pub schedule_events: usize,
    pub queue_length: usize,
}

/// The in-memory schedule store.
pub struct ScheduleRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::new()),
        }
    }

    // ------------------------------------------------------------------
    // Schedule operations
    // ------------------------------------------------------------------

    /// Look up a schedule by id.
    pub async fn query_schedule(&self, schedule_id: &str) -> SchedulerResult<Schedule> {
        let inner = self.inner.lock().await;
        inner
            .by_id
            .get(schedule_id)
            .map(|ctx| ctx.schedule())
            .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))
    }

    /// Look up a schedule by name.
    pub async fn query_schedule_by_name(&self, name: &str) -> SchedulerResult<Schedule> {
        let inner = self.inner.lock().await;
        inner
            .by_name
            .get(name)
            .map(|ctx| ctx.schedule())
            .ok_or_else(|| SchedulerError::schedule_not_found(name))
    }

    /// Register a schedule, prime its context and place it on the queue.
    ///
    /// Re-adding an already-known id is a no-op; a fresh id whose name is
    /// taken by a live schedule fails with `AlreadyExists`.
    pub async fn add_schedule(&self, schedule: Schedule) -> SchedulerResult<()> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        if inner.by_id.contains_key(&schedule.id) {
            tracing::debug!(id = %schedule.id, "schedule already registered, skipping");
            return Ok(());
        }
        if inner.by_name.contains_key(&schedule.name) {
            return Err(SchedulerError::schedule_exists(&schedule.name));
        }

        let context = Arc::new(ScheduleContext::new(schedule.clone(), now)?);
        tracing::debug!(schedule = %context.describe(), "adding schedule");

        inner.by_id.insert(schedule.id.clone(), context.clone());
        inner.by_name.insert(schedule.name.clone(), context.clone());
        inner.queue.enqueue(context);

        Ok(())
    }

    /// Rewrite an existing schedule and re-prime it against the wall clock.
    ///
    /// The context's events and queue position are preserved; a context that
    /// had retired is placed back on the queue when the new recurrence gives
    /// it a future fire time.
    pub async fn update_schedule(&self, schedule: Schedule) -> SchedulerResult<()> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let context = inner
            .by_id
            .get(&schedule.id)
            .cloned()
            .ok_or_else(|| SchedulerError::schedule_not_found(&schedule.id))?;

        let old_name = context.schedule_name();
        if old_name != schedule.name && inner.by_name.contains_key(&schedule.name) {
            return Err(SchedulerError::schedule_exists(&schedule.name));
        }

        context.reset(schedule.clone(), now)?;
        tracing::debug!(schedule = %context.describe(), "updated schedule");

        if old_name != schedule.name {
            inner.by_name.remove(&old_name);
            inner.by_name.insert(schedule.name, context.clone());
        }
        inner.promote(&context);

        Ok(())
    }

    /// Tombstone a schedule and drop it from every index.
    ///
    /// The queue entry is reclaimed lazily by the next tick.
    pub async fn remove_schedule(&self, schedule_id: &str) -> SchedulerResult<()> {
        let mut inner = self.inner.lock().await;

        let context = inner
            .by_id
            .remove(schedule_id)
            .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))?;

        context.mark_deleted();

        for event_id in context.event_ids() {
            if let Some(event) = context.event(&event_id) {
                inner.unindex_event_name(&event.name);
            }
            inner.event_to_schedule.remove(&event_id);
        }

        inner.by_name.remove(&context.schedule_name());
        tracing::debug!(id = %schedule_id, "removed schedule");

        Ok(())
    }

    // ------------------------------------------------------------------
    // Schedule event operations
    // ------------------------------------------------------------------

    /// Look up an event by id, through the event→schedule indirection.
    pub async fn query_schedule_event(&self, event_id: &str) -> SchedulerResult<ScheduleEvent> {
        let inner = self.inner.lock().await;
        Self::event_by_id(&inner, event_id)
    }

    /// Look up an event by name.
    pub async fn query_schedule_event_by_name(&self, name: &str) -> SchedulerResult<ScheduleEvent> {
        let inner = self.inner.lock().await;

        let schedule_id = inner
            .event_name_to_schedule
            .get(name)
            .ok_or_else(|| SchedulerError::event_not_found(name))?;
        let event_id = inner
            .event_name_to_event
            .get(name)
            .ok_or_else(|| SchedulerError::event_not_found(name))?;
        let context = inner
            .by_id
            .get(schedule_id)
            .ok_or_else(|| SchedulerError::event_not_found(name))?;

        context
            .event(event_id)
            .ok_or_else(|| SchedulerError::event_not_found(name))
    }

    /// Bind an event to its owning schedule (resolved by name).
    ///
    /// A retired owner is re-primed and promoted back onto the queue so the
    /// new event gets a chance to fire.
    pub async fn add_schedule_event(&self, event: ScheduleEvent) -> SchedulerResult<()> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let context = inner
            .by_name
            .get(&event.schedule)
            .cloned()
            .ok_or_else(|| SchedulerError::unknown_schedule(&event.name, &event.schedule))?;

        if let Some(owner) = inner.event_name_to_event.get(&event.name) {
            if owner != &event.id {
                return Err(SchedulerError::event_exists(&event.name));
            }
        }

        let schedule_id = context.schedule_id();
        tracing::debug!(event = %event.describe(), schedule = %event.schedule, "adding schedule event");

        context.insert_event(event.clone());
        inner.index_event(&event, &schedule_id);

        if context.is_retired() {
            context.reprime(now);
        }
        inner.promote(&context);

        Ok(())
    }

    /// Update an event, relocating it when its owning schedule changed.
    ///
    /// A relocation that empties the old context retires it: the context is
    /// tombstoned and dropped from both schedule indices.
    pub async fn update_schedule_event(&self, event: ScheduleEvent) -> SchedulerResult<()> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let old_schedule_id = inner
            .event_to_schedule
            .get(&event.id)
            .cloned()
            .ok_or_else(|| SchedulerError::event_not_found(&event.id))?;

        let new_context = inner
            .by_name
            .get(&event.schedule)
            .cloned()
            .ok_or_else(|| SchedulerError::unknown_schedule(&event.name, &event.schedule))?;
        let new_schedule_id = new_context.schedule_id();

        if let Some(owner) = inner.event_name_to_event.get(&event.name) {
            if owner != &event.id {
                return Err(SchedulerError::event_exists(&event.name));
            }
        }

        if new_schedule_id != old_schedule_id {
            tracing::debug!(
                event = %event.id,
                from = %old_schedule_id,
                to = %new_schedule_id,
                "schedule event switched schedule"
            );

            if let Some(old_context) = inner.by_id.get(&old_schedule_id).cloned() {
                if let Some(old_event) = old_context.remove_event(&event.id) {
                    if old_event.name != event.name {
                        inner.unindex_event_name(&old_event.name);
                    }
                }

                if old_context.event_count() == 0 {
                    tracing::debug!(
                        id = %old_schedule_id,
                        "old schedule has no events left, retiring it"
                    );
                    old_context.mark_deleted();
                    inner.by_id.remove(&old_schedule_id);
                    inner.by_name.remove(&old_context.schedule_name());
                }
            }

            new_context.insert_event(event.clone());
            inner.index_event(&event, &new_schedule_id);

            if new_context.is_retired() {
                new_context.reprime(now);
            }
            inner.promote(&new_context);
        } else {
            if let Some(old_event) = new_context.event(&event.id) {
                if old_event.name != event.name {
                    inner.unindex_event_name(&old_event.name);
                }
            }
            new_context.insert_event(event.clone());
            inner.index_event(&event, &new_schedule_id);
        }

        Ok(())
    }

    /// Detach an event and drop its three index entries.
    ///
    /// The owning context stays registered even when its event map empties;
    /// only the event-relocation path retires emptied contexts.
    pub async fn remove_schedule_event(&self, event_id: &str) -> SchedulerResult<()> {
        let mut inner = self.inner.lock().await;

        let schedule_id = inner
            .event_to_schedule
            .remove(event_id)
            .ok_or_else(|| SchedulerError::event_not_found(event_id))?;

        let context = inner
            .by_id
            .get(&schedule_id)
            .cloned()
            .ok_or_else(|| SchedulerError::event_not_found(event_id))?;

        if let Some(event) = context.remove_event(event_id) {
            inner.unindex_event_name(&event.name);
        }

        tracing::debug!(id = %event_id, "removed schedule event");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tick support
    // ------------------------------------------------------------------

    /// One tick's worth of queue work: scan the entries present at entry,
    /// drop tombstoned and retired contexts, requeue the not-yet-due ones
    /// and hand back the due ones (flagged in-flight).
    ///
    /// Contexts enqueued while a tick runs are seen on the next tick.
    pub async fn collect_due(&self, now: DateTime<Utc>) -> Vec<ContextHandle> {
        let mut inner = self.inner.lock().await;

        let length = inner.queue.len();
        let mut due = Vec::new();

        for _ in 0..length {
            let Some(context) = inner.queue.dequeue_front() else {
                break;
            };

            if context.is_deleted() {
                tracing::debug!(schedule = %context.describe(), "dropping tombstoned schedule");
                continue;
            }
            if context.is_retired() {
                tracing::debug!(schedule = %context.describe(), "dropping completed schedule");
                continue;
            }

            if context.is_due(now) {
                context.set_in_flight(true);
                due.push(context);
            } else {
                inner.queue.enqueue(context);
            }
        }

        due
    }

    /// Return a dispatched context to the queue, unless its recurrence
    /// completed or it was removed while in flight.
    pub async fn finish_dispatch(&self, context: ContextHandle, complete: bool) {
        let mut inner = self.inner.lock().await;
        context.set_in_flight(false);

        if context.is_deleted() {
            tracing::debug!(schedule = %context.describe(), "schedule removed mid-dispatch, not requeueing");
            return;
        }
        if complete || context.is_retired() {
            tracing::debug!(schedule = %context.describe(), "completed schedule");
            return;
        }

        tracing::debug!(schedule = %context.describe(), "requeueing schedule");
        inner.queue.enqueue(context);
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Drop everything: indices, queue, and any in-flight requeues (the
    /// contexts are tombstoned so a dispatch in progress cannot resurrect
    /// itself into the fresh state). Used by the full-reload path.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;

        for context in inner.by_id.values() {
            context.mark_deleted();
        }

        inner.by_id.clear();
        inner.by_name.clear();
        inner.event_to_schedule.clear();
        inner.event_name_to_schedule.clear();
        inner.event_name_to_event.clear();
        inner.queue.clear();
    }

    /// Current sizes, for the stats endpoint and metrics gauges.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().await;
        RegistryStats {
            schedules: inner.by_id.len(),
            schedule_events: inner.event_to_schedule.len(),
            queue_length: inner.queue.len(),
        }
    }

    fn event_by_id(inner: &RegistryInner, event_id: &str) -> SchedulerResult<ScheduleEvent> {
        let schedule_id = inner
            .event_to_schedule
            .get(event_id)
            .ok_or_else(|| SchedulerError::event_not_found(event_id))?;
        let context = inner
            .by_id
            .get(schedule_id)
            .ok_or_else(|| SchedulerError::event_not_found(event_id))?;
        context
            .event(event_id)
            .ok_or_else(|| SchedulerError::event_not_found(event_id))
    }
}

// ============================================================================
// Tests
// ============================================================================
