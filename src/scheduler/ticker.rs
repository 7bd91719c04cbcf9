//! Tick engine
//!
//! The periodic driver of the scheduler: every `tick_interval` it snapshots
//! the wall clock, asks the registry for the contexts that have come due,
//! fans their dispatches out concurrently and waits for all of them before
//! the next tick, so ticks never overlap. A failure or panic inside a dispatch
//! is contained at the dispatch boundary; the loop itself never terminates
//! on one.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::executor::EventExecutor;
use super::registry::ScheduleRegistry;
use crate::metrics;

/// Default interval between queue scans.
pub const DEFAULT_TICK_INTERVAL_MILLIS: u64 = 500;

/// Periodic driver: `Stopped → Running → Stopped` via [`Ticker::start`] and
/// [`Ticker::stop`].
pub struct Ticker {
    registry: Arc<ScheduleRegistry>,
    executor: Arc<EventExecutor>,
    tick_interval: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    pub fn new(
        registry: Arc<ScheduleRegistry>,
        executor: Arc<EventExecutor>,
        tick_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            executor,
            tick_interval,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Start ticking in a background task. A second call while running is a
    /// no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let _ = self.shutdown.send(false);
        let registry = self.registry.clone();
        let executor = self.executor.clone();
        let tick_interval = self.tick_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        tracing::info!(interval_ms = tick_interval.as_millis() as u64, "ticker started");

        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; skip it so a fresh
            // ticker waits one full interval like every later tick.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_tick(&registry, &executor).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("ticker stopped");
        }));
    }

    /// Stop ticking. In-flight dispatches of the current tick are allowed to
    /// complete before the loop exits.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);

        let handle = {
            let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// True while the background loop is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

/// One tick: select due contexts, dispatch them concurrently, wait them out.
async fn run_tick(registry: &Arc<ScheduleRegistry>, executor: &Arc<EventExecutor>) {
    let now = Utc::now();
    metrics::TICKS_TOTAL.inc();

    let stats = registry.stats().await;
    metrics::SCHEDULES.set(stats.schedules as i64);
    metrics::SCHEDULE_EVENTS.set(stats.schedule_events as i64);
    metrics::QUEUE_LENGTH.set(stats.queue_length as i64);

    let due = registry.collect_due(now).await;
    if due.is_empty() {
        return;
    }

    let mut dispatches = Vec::with_capacity(due.len());
    for context in due {
        let executor = executor.clone();
        let dispatched = context.clone();
        let handle = tokio::spawn(async move { executor.dispatch(&dispatched).await });
        dispatches.push((context, handle));
    }

    for (context, handle) in dispatches {
        match handle.await {
            Ok(complete) => registry.finish_dispatch(context, complete).await,
            Err(e) => {
                // Dispatch panicked. Advance past the failed firing so a
                // poisoned event cannot refire on every subsequent tick.
                tracing::error!(schedule = %context.schedule_name(), "dispatch panicked: {}", e);
                let complete = context.advance(Utc::now());
                registry.finish_dispatch(context, complete).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schedule;

    fn ticker_with_registry() -> (Ticker, Arc<ScheduleRegistry>) {
        let registry = Arc::new(ScheduleRegistry::new());
        let executor = Arc::new(EventExecutor::new(Duration::from_millis(500)).unwrap());
        let ticker = Ticker::new(
            registry.clone(),
            executor,
            Duration::from_millis(20),
        );
        (ticker, registry)
    }

    fn due_now(id: &str, name: &str, run_once: bool) -> Schedule {
        // No frequency: due at prime time, so the very next tick fires it.
        Schedule {
            id: id.to_string(),
            name: name.to_string(),
            run_once,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let (ticker, _registry) = ticker_with_registry();
        assert!(!ticker.is_running());

        ticker.start();
        assert!(ticker.is_running());

        // Idempotent start.
        ticker.start();
        assert!(ticker.is_running());

        ticker.stop().await;
        assert!(!ticker.is_running());

        // Can start again after a stop.
        ticker.start();
        assert!(ticker.is_running());
        ticker.stop().await;
    }

    #[tokio::test]
    async fn test_run_once_schedule_fires_once_and_retires() {
        let (ticker, registry) = ticker_with_registry();
        registry
            .add_schedule(due_now("s1", "one-shot", true))
            .await
            .unwrap();

        ticker.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        ticker.stop().await;

        let stats = registry.stats().await;
        assert_eq!(stats.queue_length, 0, "run-once schedule must leave the queue");
        // Indices keep the retired schedule queryable.
        assert_eq!(
            registry.query_schedule("s1").await.unwrap().name,
            "one-shot"
        );
    }

    #[tokio::test]
    async fn test_expired_schedule_is_reclaimed_without_dispatch() {
        let (ticker, registry) = ticker_with_registry();
        let expired = Schedule {
            id: "s1".to_string(),
            name: "expired".to_string(),
            frequency: Some("PT1S".to_string()),
            end: Some("20180101T000000".to_string()),
            ..Default::default()
        };
        registry.add_schedule(expired).await.unwrap();
        assert_eq!(registry.stats().await.queue_length, 1);

        ticker.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        ticker.stop().await;

        assert_eq!(registry.stats().await.queue_length, 0);
    }

    #[tokio::test]
    async fn test_frequency_schedule_fires_one_step_after_priming() {
        let (ticker, registry) = ticker_with_registry();
        let mut once = due_now("s1", "one-shot-delayed", true);
        once.frequency = Some("PT1S".to_string());
        registry.add_schedule(once).await.unwrap();

        ticker.start();

        // First fire time is one frequency step out, so nothing happens for
        // the first second.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(registry.stats().await.queue_length, 1);

        // Past the step the schedule fires once and retires.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        ticker.stop().await;
        assert_eq!(registry.stats().await.queue_length, 0);
    }
}
