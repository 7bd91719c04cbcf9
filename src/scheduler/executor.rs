//! Event executor
//!
//! Performs the outbound HTTP callouts for one due context. Every event of
//! the context is attempted; a bad method or a failed request is logged and
//! skipped so one misbehaving event cannot stop the rest. Response status
//! and body are logged, never propagated, and nothing is retried.

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use std::time::Duration;

use super::context::ContextHandle;
use super::error::{SchedulerError, SchedulerResult};
use crate::metrics;
use crate::models::ScheduleEvent;

/// Methods an addressable may carry, per RFC 2616.
const VALID_METHODS: [&str; 7] = ["GET", "HEAD", "POST", "PUT", "DELETE", "TRACE", "CONNECT"];

/// Case-insensitive membership test against [`VALID_METHODS`].
pub fn valid_http_method(method: &str) -> bool {
    let upper = method.to_uppercase();
    VALID_METHODS.contains(&upper.as_str())
}

/// Fires the events of due contexts.
pub struct EventExecutor {
    client: Client,
}

impl EventExecutor {
    /// Create an executor whose requests share one overall timeout.
    pub fn new(timeout: Duration) -> SchedulerResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SchedulerError::dispatch_failed("executor", format!("http client init: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Execute all events of one context, then advance its recurrence.
    ///
    /// Returns true when the recurrence completed and the context must be
    /// retired instead of requeued.
    pub async fn dispatch(&self, context: &ContextHandle) -> bool {
        let events = context.events_snapshot();
        tracing::debug!(
            schedule = %context.schedule_name(),
            events = events.len(),
            "dispatching schedule"
        );

        for event in &events {
            match self.execute_event(event).await {
                Ok(()) => metrics::DISPATCHES_TOTAL.inc(),
                Err(e) => {
                    metrics::DISPATCH_ERRORS_TOTAL.inc();
                    tracing::error!(event = %event.name, "{}", e);
                }
            }
        }

        context.advance(Utc::now())
    }

    async fn execute_event(&self, event: &ScheduleEvent) -> SchedulerResult<()> {
        let raw_method = &event.addressable.http_method;
        if !valid_http_method(raw_method) {
            return Err(SchedulerError::invalid_method(raw_method));
        }
        let method = Method::from_bytes(raw_method.to_uppercase().as_bytes())
            .map_err(|_| SchedulerError::invalid_method(raw_method))?;

        let url = event.addressable.url();
        tracing::debug!(event = %event.id, url = %url, "executing schedule event");

        let mut request = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");

        let parameters = event.parameters.trim();
        if !parameters.is_empty() {
            request = request.body(parameters.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::dispatch_failed(&event.name, e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            event = %event.id,
            status = %status.as_u16(),
            body = %body,
            "schedule event executed"
        );

        Ok(())
    }
}
