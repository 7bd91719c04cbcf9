// Core data structures for the metronome scheduler

use serde::{Deserialize, Serialize};

/// Recurrence specification for a set of timed actions.
///
/// A schedule is addressable both by its opaque `id` and by its
/// human-readable `name`; both are unique within a registry. `start`,
/// `end`, `frequency` and `cron` are kept in their wire form (compact
/// timestamp / ISO-8601 duration / cron expression) and parsed once at
/// registration time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Stable identifier, assigned by the metadata service (or generated
    /// locally for direct API inserts).
    #[serde(default)]
    pub id: String,

    /// Unique human-readable name.
    pub name: String,

    /// Earliest instant the schedule may fire (`YYYYMMDDTHHMMSS`, UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// Instant after which the schedule is complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    /// ISO-8601 duration between firings (e.g. `PT30S`, `PT1H`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,

    /// Cron expression, alternative to `frequency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    /// Fire at most once, then retire.
    #[serde(default)]
    pub run_once: bool,
}

impl Schedule {
    /// Short one-line description used in log output.
    pub fn describe(&self) -> String {
        format!(
            "id: {} name: {} start: {} end: {} frequency: {} cron: {} runOnce: {}",
            self.id,
            self.name,
            self.start.as_deref().unwrap_or("-"),
            self.end.as_deref().unwrap_or("-"),
            self.frequency.as_deref().unwrap_or("-"),
            self.cron.as_deref().unwrap_or("-"),
            self.run_once,
        )
    }
}

/// Structured destination of an outbound HTTP callout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addressable {
    #[serde(default)]
    pub id: String,

    /// Unique addressable name in the metadata service.
    pub name: String,

    /// URL scheme (`http`, `https`).
    pub protocol: String,

    /// Target host.
    pub address: String,

    /// Target port.
    pub port: u16,

    /// Request path, including the leading slash.
    #[serde(default)]
    pub path: String,

    /// HTTP method, stored as written (validated at dispatch time).
    #[serde(default)]
    pub http_method: String,
}

impl Addressable {
    /// Base URL without the path: `protocol://address:port`.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.protocol.to_lowercase(),
            self.address,
            self.port
        )
    }

    /// Full request URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url(), self.path)
    }
}

/// A concrete action bound to a schedule by the schedule's *name*.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    #[serde(default)]
    pub id: String,

    /// Unique event name.
    pub name: String,

    /// Name of the owning schedule.
    pub schedule: String,

    /// Free-form payload forwarded with the callout.
    #[serde(default)]
    pub parameters: String,

    /// Originating service, used by the boot filter policy.
    #[serde(default)]
    pub service: String,

    /// Where the callout goes.
    pub addressable: Addressable,
}

impl ScheduleEvent {
    /// Short one-line description used in log output.
    pub fn describe(&self) -> String {
        format!(
            "id: {} name: {} schedule: {} service: {} target: {} {}",
            self.id,
            self.name,
            self.schedule,
            self.service,
            self.addressable.http_method,
            self.addressable.url(),
        )
    }
}
