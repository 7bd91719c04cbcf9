//! Interval action scheduling
//!
//! The scheduler core: a registry of schedules and their events, a dispatch
//! queue of live contexts, a periodic tick engine and an HTTP event
//! executor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ScheduleRegistry                        │
//! │  id index ─┐                                    ┌─ name index│
//! │            ├──► ScheduleContext (events, next,  │            │
//! │  event ────┘         iterations, tombstone) ◄──┘            │
//! │  indices                     │                               │
//! │                      ┌───────▼───────┐                       │
//! │                      │ DispatchQueue │                       │
//! │                      └───────┬───────┘                       │
//! └──────────────────────────────┼───────────────────────────────┘
//!                                │ collect_due / finish_dispatch
//!                         ┌──────▼──────┐
//!                         │    Ticker   │  every tick_interval
//!                         └──────┬──────┘
//!                                │ fan-out, joined per tick
//!                         ┌──────▼──────┐
//!                         │EventExecutor│  HTTP callouts
//!                         └─────────────┘
//! ```
//!
//! Writers (the inbound API, the boot loader) mutate the registry under its
//! single lock; the ticker drains due contexts and hands them to the
//! executor, which performs its HTTP work outside every lock and advances
//! only its own context.
//!
//! # Modules
//!
//! - [`recurrence`] - Duration/cron parsing and next-fire-time evaluation
//! - [`context`] - The live per-schedule runtime object
//! - [`queue`] - FIFO of contexts eligible for firing
//! - [`registry`] - Indexed store enforcing the cross-reference invariants
//! - [`ticker`] - The periodic driver
//! - [`executor`] - Outbound HTTP callouts
//! - [`error`] - Scheduler error kinds

pub mod context;
pub mod error;
pub mod executor;
pub mod queue;
pub mod recurrence;
pub mod registry;
pub mod ticker;

// Re-export main types
pub use context::{ContextHandle, ScheduleContext};
pub use error::{SchedulerError, SchedulerResult};
pub use executor::{valid_http_method, EventExecutor};
pub use queue::DispatchQueue;
pub use recurrence::{parse_duration, parse_timestamp, Evaluation, Recurrence, TIME_LAYOUT};
pub use registry::{RegistryStats, ScheduleRegistry};
pub use ticker::{Ticker, DEFAULT_TICK_INTERVAL_MILLIS};
