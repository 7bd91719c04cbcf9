//! metronome - Interval Action Scheduler
//!
//! A persistent in-memory action scheduler that periodically fires HTTP
//! callouts on behalf of a surrounding edge-computing platform. Schedules
//! (recurrence specifications) and schedule events (concrete HTTP actions)
//! are kept in an indexed registry; a tick engine scans the dispatch queue,
//! fires everything that has come due and requeues or retires each context
//! based on its recurrence.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures (schedules, events, addressables)
//! - [`scheduler`] - Registry, dispatch queue, tick engine and executor
//! - [`metadata`] - Client for the external metadata service
//! - [`loader`] - Boot-time registry population (metadata pull + config)
//! - [`server`] - Inbound HTTP API
//! - [`metrics`] - Prometheus counters and gauges
//!
//! # Example
//!
//! ```no_run
//! use metronome::config::Config;
//! use metronome::server::SchedulerServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = SchedulerServer::new(config)?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod server;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::{Addressable, Schedule, ScheduleEvent};
    pub use crate::scheduler::{
        EventExecutor, ScheduleRegistry, SchedulerError, SchedulerResult, Ticker,
    };
    pub use crate::server::SchedulerServer;
}

// Direct re-exports for convenience
pub use models::{Addressable, Schedule, ScheduleEvent};
