//! Core domain types for dose scheduling.
//!
//! This module defines the fundamental types used throughout the system:
//! - Schedules and their recurrence rules
//! - Medications as consumed from the outer system
//! - Computed dose occurrences (never persisted)
//! - Taken records (the only persisted fact)

use crate::DoseId;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// How often a schedule fires
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
}

/// A recurrence rule for one medication.
///
/// `days_of_week` uses ISO numbering (1 = Monday .. 7 = Sunday). It is
/// required and non-empty for weekly schedules and absent for daily ones.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    /// Opaque id; never contains `|`
    pub id: String,
    pub medication_id: String,
    pub recipient_id: String,
    pub recurrence: Recurrence,
    /// Local wall-clock time, strict `HH:MM`
    pub time_of_day: String,
    /// IANA zone name; `None` or empty means the default zone
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    /// First local calendar date (inclusive)
    pub start_date: NaiveDate,
    /// Last local calendar date (inclusive)
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Schedule {
    /// The schedule's own timezone, if it names a non-empty one
    pub fn explicit_timezone(&self) -> Option<&str> {
        self.timezone.as_deref().filter(|tz| !tz.trim().is_empty())
    }
}

// ============================================================================
// Medication Types
// ============================================================================

/// A medication as seen by the dose core (read-only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: String,
    pub recipient_id: String,
    pub name: String,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub inactive_at: Option<DateTime<Utc>>,
}

fn default_is_active() -> bool {
    true
}

impl Medication {
    /// Either signal alone marks the medication inactive
    pub fn is_inactive(&self) -> bool {
        !self.is_active || self.inactive_at.is_some()
    }

    /// True if a dose at `scheduled_for` falls after the deactivation cutoff
    pub fn is_past_cutoff(&self, scheduled_for: DateTime<Utc>) -> bool {
        self.inactive_at
            .map(|cutoff| scheduled_for > cutoff)
            .unwrap_or(false)
    }
}

// ============================================================================
// Dose Types
// ============================================================================

/// Status of a computed dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Scheduled,
    Taken,
}

/// A single computed dose, merged with its taken state.
///
/// Built fresh on every query; identity is `(schedule_id, scheduled_for)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseOccurrence {
    pub dose_id: DoseId,
    pub schedule_id: String,
    pub medication_id: String,
    pub recipient_id: String,
    pub medication_name: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: DoseStatus,
    pub taken_at: Option<DateTime<Utc>>,
    pub taken_by_user_id: Option<String>,
}

/// Optional bounds of a listing window; missing bounds are filled in by the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DoseWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DoseWindow {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Fill missing bounds: `from` defaults to `now`, `to` to `from + length`
    pub fn resolve(&self, now: DateTime<Utc>, length: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.from.unwrap_or(now);
        let to = self.to.unwrap_or(from + length);
        (from, to)
    }
}

// ============================================================================
// Taken Records
// ============================================================================

/// A persisted "dose was taken" fact.
///
/// At most one exists per `(schedule_id, scheduled_for)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TakenRecord {
    pub id: Uuid,
    pub recipient_id: String,
    pub medication_id: String,
    pub schedule_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
    pub taken_by_user_id: String,
}

/// Insert request for a taken record
#[derive(Clone, Debug, PartialEq)]
pub struct NewTakenRecord {
    pub schedule_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
    pub taken_by_user_id: String,
    pub recipient_id: String,
    pub medication_id: String,
}

impl NewTakenRecord {
    pub fn into_record(self) -> TakenRecord {
        TakenRecord {
            id: Uuid::new_v4(),
            recipient_id: self.recipient_id,
            medication_id: self.medication_id,
            schedule_id: self.schedule_id,
            scheduled_for: self.scheduled_for,
            taken_at: self.taken_at,
            taken_by_user_id: self.taken_by_user_id,
        }
    }
}

/// Who took a dose and when, as returned by the taken map
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TakenEntry {
    pub taken_at: DateTime<Utc>,
    pub taken_by_user_id: String,
}

impl From<&TakenRecord> for TakenEntry {
    fn from(record: &TakenRecord) -> Self {
        TakenEntry {
            taken_at: record.taken_at,
            taken_by_user_id: record.taken_by_user_id.clone(),
        }
    }
}
