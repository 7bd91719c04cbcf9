//! Boot-time registry population
//!
//! Two sources feed the registry: the metadata service (the system of
//! record) and the static entries of the local configuration. The loader
//! pulls the persisted schedules and events first, then mirrors the
//! configured ones back into metadata so the local registry and the
//! metadata service agree.
//!
//! A filter policy keeps device-reserved timing out of this scheduler: any
//! schedule whose name matches `device.*`, and any event whose service
//! matches `device.*`, is skipped.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::metadata::MetadataClient;
use crate::scheduler::{ScheduleRegistry, SchedulerError, SchedulerResult};

lazy_static! {
    static ref DEVICE_RE: Regex = Regex::new("device.*").expect("device filter regex");
}

/// True for names/services reserved for device-driven timing.
pub fn is_device_reserved(value: &str) -> bool {
    DEVICE_RE.is_match(value)
}

/// What a full load accomplished, reported by the reload endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub schedules_added: usize,
    pub events_added: usize,
    pub skipped_reserved: usize,
    pub skipped_existing: usize,
}

/// Populates the registry from metadata and the static configuration.
pub struct ScheduleLoader {
    registry: Arc<ScheduleRegistry>,
    metadata: Arc<MetadataClient>,
    config: Arc<Config>,
}

impl ScheduleLoader {
    pub fn new(
        registry: Arc<ScheduleRegistry>,
        metadata: Arc<MetadataClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            metadata,
            config,
        }
    }

    /// Full (re)load: clear the registry, pull metadata, ingest config.
    ///
    /// A metadata pull failure aborts the load with `MetadataUnavailable`;
    /// at boot that is fatal for the boot sequence.
    pub async fn load_all(&self) -> SchedulerResult<LoadSummary> {
        self.registry.clear().await;

        tracing::info!("loading schedules, schedule events and addressables");

        let mut summary = LoadSummary::default();
        self.load_metadata(&mut summary).await?;
        self.load_config_schedules(&mut summary).await?;
        self.load_config_schedule_events(&mut summary).await?;

        tracing::info!(
            schedules = summary.schedules_added,
            events = summary.events_added,
            skipped_reserved = summary.skipped_reserved,
            skipped_existing = summary.skipped_existing,
            "completed loading schedules, schedule events and addressables"
        );

        Ok(summary)
    }

    /// Pull the persisted schedules and events from metadata.
    async fn load_metadata(&self, summary: &mut LoadSummary) -> SchedulerResult<()> {
        let schedules = self.metadata.schedules().await.map_err(|e| {
            SchedulerError::metadata_unavailable("pull schedules", e.to_string())
        })?;

        for schedule in schedules {
            if is_device_reserved(&schedule.name) {
                tracing::debug!(name = %schedule.name, "skipping device-reserved schedule");
                summary.skipped_reserved += 1;
                continue;
            }
            tracing::info!(name = %schedule.name, id = %schedule.id, "adding metadata schedule");
            self.registry.add_schedule(schedule).await?;
            summary.schedules_added += 1;
        }

        let events = self.metadata.schedule_events().await.map_err(|e| {
            SchedulerError::metadata_unavailable("pull schedule events", e.to_string())
        })?;

        for event in events {
            if is_device_reserved(&event.service) {
                tracing::debug!(name = %event.name, service = %event.service, "skipping device-reserved event");
                summary.skipped_reserved += 1;
                continue;
            }
            tracing::info!(name = %event.name, schedule = %event.schedule, "adding metadata schedule event");
            self.registry.add_schedule_event(event).await?;
            summary.events_added += 1;
        }

        Ok(())
    }

    /// Register configured schedules with metadata, then locally.
    async fn load_config_schedules(&self, summary: &mut LoadSummary) -> SchedulerResult<()> {
        for entry in &self.config.schedules {
            if self
                .registry
                .query_schedule_by_name(&entry.name)
                .await
                .is_ok()
            {
                tracing::debug!(name = %entry.name, "configured schedule already present");
                summary.skipped_existing += 1;
                continue;
            }

            let mut schedule = entry.to_schedule();
            let id = self.metadata.add_schedule(&schedule).await.map_err(|e| {
                SchedulerError::metadata_unavailable("add schedule", e.to_string())
            })?;
            tracing::info!(name = %schedule.name, id = %id, "registered configured schedule with metadata");

            schedule.id = id;
            self.registry.add_schedule(schedule).await?;
            summary.schedules_added += 1;
        }

        Ok(())
    }

    /// Register configured events (and their addressables) with metadata,
    /// then locally.
    async fn load_config_schedule_events(&self, summary: &mut LoadSummary) -> SchedulerResult<()> {
        for entry in &self.config.schedule_events {
            if self
                .registry
                .query_schedule_event_by_name(&entry.name)
                .await
                .is_ok()
            {
                tracing::debug!(name = %entry.name, "configured schedule event already present");
                summary.skipped_existing += 1;
                continue;
            }

            let mut event = entry.to_event();

            match self
                .metadata
                .addressable_for_name(&event.addressable.name)
                .await
            {
                Ok(existing) => {
                    event.addressable.id = existing.id;
                }
                Err(e) if e.is_not_found() => {
                    let id = self
                        .metadata
                        .add_addressable(&event.addressable)
                        .await
                        .map_err(|e| {
                            SchedulerError::metadata_unavailable(
                                "add addressable",
                                e.to_string(),
                            )
                        })?;
                    tracing::info!(
                        name = %event.addressable.name,
                        id = %id,
                        "registered addressable with metadata"
                    );
                    event.addressable.id = id;
                }
                Err(e) => {
                    return Err(SchedulerError::metadata_unavailable(
                        "query addressable",
                        e.to_string(),
                    ));
                }
            }

            let id = self.metadata.add_schedule_event(&event).await.map_err(|e| {
                SchedulerError::metadata_unavailable("add schedule event", e.to_string())
            })?;
            tracing::info!(name = %event.name, id = %id, "registered configured schedule event with metadata");

            event.id = id;
            self.registry.add_schedule_event(event).await?;
            summary.events_added += 1;
        }

        Ok(())
    }
}
