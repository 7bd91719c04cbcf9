//! Recurrence evaluation
//!
//! A [`Recurrence`] is the parsed form of a schedule's timing fields. It is
//! built once at registration time (so malformed input fails the insertion,
//! not the tick loop) and then consulted as a pure function: given a
//! reference instant it yields the next fire time, or declares the schedule
//! complete.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

use super::error::{SchedulerError, SchedulerResult};
use crate::models::Schedule;

/// Compact timestamp layout used by schedule `start`/`end` fields.
pub const TIME_LAYOUT: &str = "%Y%m%dT%H%M%S";

lazy_static! {
    // ISO-8601 duration, integer designators only. Years and months are
    // approximated as 365 and 30 days.
    static ref DURATION_RE: Regex = Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$"
    )
    .expect("duration regex");
}

/// Parse a `YYYYMMDDTHHMMSS` timestamp as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(value, TIME_LAYOUT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("bad timestamp '{}': {}", value, e))
}

/// Parse an ISO-8601 duration string into a chrono [`Duration`].
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let captures = DURATION_RE
        .captures(value)
        .ok_or_else(|| format!("bad duration '{}'", value))?;

    let component = |index: usize| -> i64 {
        captures
            .get(index)
            .map(|m| m.as_str().parse::<i64>().unwrap_or(0))
            .unwrap_or(0)
    };

    if (1..=7).all(|i| captures.get(i).is_none()) {
        return Err(format!("bad duration '{}': no components", value));
    }

    let total = Duration::days(component(1) * 365)
        + Duration::days(component(2) * 30)
        + Duration::weeks(component(3))
        + Duration::days(component(4))
        + Duration::hours(component(5))
        + Duration::minutes(component(6))
        + Duration::seconds(component(7));

    if total <= Duration::zero() {
        return Err(format!("bad duration '{}': must be positive", value));
    }

    Ok(total)
}

/// Outcome of a recurrence evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// The schedule should fire next at this instant.
    Next(DateTime<Utc>),

    /// The recurrence is exhausted; retire the context.
    Complete,
}

impl Evaluation {
    /// The next fire time, if any.
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Next(at) => Some(*at),
            Self::Complete => None,
        }
    }

    /// True when the recurrence is exhausted.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Parsed recurrence of one schedule.
#[derive(Debug, Clone)]
pub struct Recurrence {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    step: Option<Duration>,
    cron: Option<Box<cron::Schedule>>,
    run_once: bool,
}

impl Recurrence {
    /// Parse the timing fields of a schedule.
    ///
    /// Fails with `InvalidRecurrence` when a timestamp, duration or cron
    /// expression is malformed, when both `frequency` and `cron` are given,
    /// or when neither is given and the schedule is not `runOnce`.
    pub fn from_schedule(schedule: &Schedule) -> SchedulerResult<Self> {
        let invalid = |reason: String| SchedulerError::invalid_recurrence(&schedule.name, reason);

        let start = match non_empty(&schedule.start) {
            Some(raw) => Some(parse_timestamp(raw).map_err(invalid)?),
            None => None,
        };
        let end = match non_empty(&schedule.end) {
            Some(raw) => Some(parse_timestamp(raw).map_err(invalid)?),
            None => None,
        };
        let step = match non_empty(&schedule.frequency) {
            Some(raw) => Some(parse_duration(raw).map_err(invalid)?),
            None => None,
        };
        let cron = match non_empty(&schedule.cron) {
            Some(raw) => Some(Box::new(
                cron::Schedule::from_str(raw)
                    .map_err(|e| invalid(format!("bad cron '{}': {}", raw, e)))?,
            )),
            None => None,
        };

        if step.is_some() && cron.is_some() {
            return Err(invalid(
                "frequency and cron are mutually exclusive".to_string(),
            ));
        }
        if step.is_none() && cron.is_none() && !schedule.run_once {
            return Err(invalid(
                "a repeating schedule needs a frequency or a cron expression".to_string(),
            ));
        }

        Ok(Self {
            start,
            end,
            step,
            cron,
            run_once: schedule.run_once,
        })
    }

    /// First evaluation, at registration or re-priming time.
    pub fn prime(&self, now: DateTime<Utc>) -> Evaluation {
        let reference = match self.start {
            Some(start) if start > now => start,
            _ => now,
        };

        let candidate = if let Some(cron) = &self.cron {
            match cron.after(&reference).next() {
                Some(at) => at,
                None => return Evaluation::Complete,
            }
        } else if let Some(step) = self.step {
            reference + step
        } else {
            // runOnce without a recurrence form fires as soon as its
            // window opens.
            reference
        };

        self.bounded(candidate)
    }

    /// Evaluation after a firing.
    ///
    /// `iterations` counts firings including the one that just finished.
    pub fn advance(&self, previous: DateTime<Utc>, iterations: u32) -> Evaluation {
        if self.run_once && iterations >= 1 {
            return Evaluation::Complete;
        }

        let candidate = if let Some(cron) = &self.cron {
            match cron.after(&previous).next() {
                Some(at) => at,
                None => return Evaluation::Complete,
            }
        } else if let Some(step) = self.step {
            previous + step
        } else {
            return Evaluation::Complete;
        };

        self.bounded(candidate)
    }

    fn bounded(&self, candidate: DateTime<Utc>) -> Evaluation {
        match self.end {
            Some(end) if candidate > end => Evaluation::Complete,
            _ => Evaluation::Next(candidate),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
