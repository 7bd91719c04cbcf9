//! Configuration management for the metronome scheduler
//!
//! This module handles loading and validating configuration from a TOML
//! file or environment variables: the service's own tick/timeout knobs, the
//! endpoints of the surrounding platform services, and the statically
//! configured schedules and schedule events the loader mirrors into the
//! registry at boot.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::models::{Addressable, Schedule, ScheduleEvent};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler service configuration
    pub service: ServiceConfig,

    /// Endpoints of the surrounding platform services
    pub clients: ClientsConfig,

    /// Statically configured schedules
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,

    /// Statically configured schedule events
    #[serde(default)]
    pub schedule_events: Vec<ScheduleEventEntry>,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Interval between queue scans in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_millis: u64,

    /// Outbound per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_millis: u64,

    /// Enable CORS for the inbound API
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Enable request logging for the inbound API
    #[serde(default = "default_true")]
    pub enable_request_logging: bool,
}

/// One platform client endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    fn new(host: &str, port: u16) -> Self {
        Self {
            protocol: default_protocol(),
            host: host.to_string(),
            port,
        }
    }

    /// Base URL: `protocol://host:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Endpoints of the platform services the scheduler talks to (or merely
/// knows about)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsConfig {
    pub metadata: Endpoint,
    pub notifications: Endpoint,
    pub command: Endpoint,
    pub coredata: Endpoint,
    pub logging: Endpoint,
}

/// A statically configured schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub run_once: bool,
}

impl ScheduleEntry {
    /// Build the schedule model (id is bound later, from metadata).
    pub fn to_schedule(&self) -> Schedule {
        Schedule {
            id: String::new(),
            name: self.name.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            frequency: self.frequency.clone(),
            cron: self.cron.clone(),
            run_once: self.run_once,
        }
    }
}

/// A statically configured schedule event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleEventEntry {
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub service: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub method: String,
    #[serde(default)]
    pub path: String,
}

impl ScheduleEventEntry {
    /// Build the event model, with the addressable named after the event
    /// the way the platform expects (`schedule-<event name>`).
    pub fn to_event(&self) -> ScheduleEvent {
        ScheduleEvent {
            id: String::new(),
            name: self.name.clone(),
            schedule: self.schedule.clone(),
            parameters: self.parameters.clone(),
            service: self.service.clone(),
            addressable: Addressable {
                id: String::new(),
                name: format!("schedule-{}", self.name),
                protocol: self.protocol.clone(),
                address: self.host.clone(),
                port: self.port,
                path: self.path.clone(),
                http_method: self.method.clone(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables over built-in defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = env_u64("METRONOME_TICK_INTERVAL_MILLIS") {
            config.service.tick_interval_millis = value;
        }
        if let Some(value) = env_u64("METRONOME_TIMEOUT_MILLIS") {
            config.service.timeout_millis = value;
        }
        if let Ok(value) = std::env::var("METRONOME_BIND_ADDRESS") {
            config.service.bind_address = value;
        }
        if let Ok(value) = std::env::var("METRONOME_METADATA_HOST") {
            config.clients.metadata.host = value;
        }
        if let Some(value) = env_u64("METRONOME_METADATA_PORT") {
            config.clients.metadata.port = value as u16;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.service.tick_interval_millis == 0 {
            anyhow::bail!("tick_interval_millis must be greater than 0");
        }

        if self.service.timeout_millis == 0 {
            anyhow::bail!("timeout_millis must be greater than 0");
        }

        self.service
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind_address: {}", self.service.bind_address))?;

        for entry in &self.schedule_events {
            if entry.schedule.is_empty() {
                anyhow::bail!("schedule event '{}' names no schedule", entry.name);
            }
        }

        Ok(())
    }

    /// Parsed bind address
    #[must_use]
    pub fn bind_address(&self) -> SocketAddr {
        // Checked by validate(); the default is always parseable.
        self.service
            .bind_address
            .parse()
            .unwrap_or_else(|_| default_bind_address().parse().expect("default bind address"))
    }

    /// Get tick interval as Duration
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.service.tick_interval_millis)
    }

    /// Get outbound request timeout as Duration
    #[must_use]
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service.timeout_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                bind_address: default_bind_address(),
                tick_interval_millis: default_tick_interval(),
                timeout_millis: default_timeout(),
                enable_cors: true,
                enable_request_logging: true,
            },
            clients: ClientsConfig {
                metadata: Endpoint::new("localhost", 48081),
                notifications: Endpoint::new("localhost", 48060),
                command: Endpoint::new("localhost", 48082),
                coredata: Endpoint::new("localhost", 48080),
                logging: Endpoint::new("localhost", 48061),
            },
            schedules: Vec::new(),
            schedule_events: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:48085".to_string()
}

fn default_tick_interval() -> u64 {
    crate::scheduler::DEFAULT_TICK_INTERVAL_MILLIS
}

fn default_timeout() -> u64 {
    5000
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_true() -> bool {
    true
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}
