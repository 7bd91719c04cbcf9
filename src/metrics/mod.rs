//! Prometheus metrics for the scheduler
//!
//! Tick and dispatch counters plus registry-size gauges, exposed over the
//! `/api/v1/metrics` endpoint in text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    /// Ticks executed since start.
    pub static ref TICKS_TOTAL: IntCounter = register_int_counter!(
        "metronome_ticks_total",
        "Number of scheduler ticks executed"
    )
    .unwrap();

    /// Schedule events dispatched successfully.
    pub static ref DISPATCHES_TOTAL: IntCounter = register_int_counter!(
        "metronome_dispatches_total",
        "Number of schedule events dispatched"
    )
    .unwrap();

    /// Schedule events that failed to dispatch (bad method, I/O error).
    pub static ref DISPATCH_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "metronome_dispatch_errors_total",
        "Number of schedule event dispatch failures"
    )
    .unwrap();

    /// Contexts currently sitting in the dispatch queue.
    pub static ref QUEUE_LENGTH: IntGauge = register_int_gauge!(
        "metronome_queue_length",
        "Number of contexts in the dispatch queue"
    )
    .unwrap();

    /// Registered schedules.
    pub static ref SCHEDULES: IntGauge = register_int_gauge!(
        "metronome_schedules",
        "Number of registered schedules"
    )
    .unwrap();

    /// Registered schedule events.
    pub static ref SCHEDULE_EVENTS: IntGauge = register_int_gauge!(
        "metronome_schedule_events",
        "Number of registered schedule events"
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = TICKS_TOTAL.get();
        TICKS_TOTAL.inc();
        assert_eq!(TICKS_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_gather_contains_metric_names() {
        TICKS_TOTAL.inc();
        QUEUE_LENGTH.set(3);

        let output = gather();
        assert!(output.contains("metronome_ticks_total"));
        assert!(output.contains("metronome_queue_length"));
    }
}
