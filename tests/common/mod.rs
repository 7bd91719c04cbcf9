//! Common test utilities

use metronome::models::{Addressable, Schedule, ScheduleEvent};

/// Create a repeating schedule with the given frequency
pub fn schedule(id: &str, name: &str, frequency: &str) -> Schedule {
    Schedule {
        id: id.to_string(),
        name: name.to_string(),
        frequency: Some(frequency.to_string()),
        ..Default::default()
    }
}

/// Create a run-once schedule that is due as soon as it is primed
#[allow(dead_code)]
pub fn run_once_schedule(id: &str, name: &str) -> Schedule {
    Schedule {
        id: id.to_string(),
        name: name.to_string(),
        run_once: true,
        ..Default::default()
    }
}

/// Create an event whose addressable points at a mock server URI
/// (`http://host:port`)
#[allow(dead_code)]
pub fn event_targeting(
    id: &str,
    name: &str,
    schedule: &str,
    mock_uri: &str,
    method: &str,
    path: &str,
) -> ScheduleEvent {
    let stripped = mock_uri
        .strip_prefix("http://")
        .unwrap_or(mock_uri)
        .trim_end_matches('/');
    let (host, port) = stripped
        .split_once(':')
        .expect("mock uri should be host:port");

    ScheduleEvent {
        id: id.to_string(),
        name: name.to_string(),
        schedule: schedule.to_string(),
        service: "test-service".to_string(),
        addressable: Addressable {
            name: format!("schedule-{}", name),
            protocol: "http".to_string(),
            address: host.to_string(),
            port: port.parse().expect("mock uri port"),
            path: path.to_string(),
            http_method: method.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}
