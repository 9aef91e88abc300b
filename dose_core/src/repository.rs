//! Collaborator interfaces consumed by the dose service.
//!
//! Schedule and medication lookups are authorization-scoped by the
//! implementation: anything the user may not see is reported as absent.
//! The taken map is *not* filtered by who marked a dose, so every
//! caregiver of a recipient sees the same taken state.

use crate::dose_id::taken_key;
use crate::{Medication, NewTakenRecord, Result, Schedule, TakenEntry, TakenRecord};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Taken map keyed by [`taken_key`]
pub type TakenMap = HashMap<String, TakenEntry>;

pub trait ScheduleRepository: Send + Sync {
    fn find_schedule_by_id(&self, user_id: &str, schedule_id: &str) -> Result<Option<Schedule>>;

    fn list_schedules_by_recipient(&self, user_id: &str, recipient_id: &str)
        -> Result<Vec<Schedule>>;
}

pub trait MedicationRepository: Send + Sync {
    fn find_medication_by_id(&self, user_id: &str, medication_id: &str)
        -> Result<Option<Medication>>;

    fn list_medications_by_recipient(
        &self,
        user_id: &str,
        recipient_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<Medication>>;
}

pub trait TakenEventStore: Send + Sync {
    /// Insert a taken record, or return the existing one for the same
    /// `(schedule_id, scheduled_for)` untouched.
    fn mark_taken(&self, user_id: &str, record: NewTakenRecord) -> Result<TakenRecord>;

    /// Taken entries for `schedule_ids` with `scheduled_for` in `[from, to)`
    fn get_taken_map(
        &self,
        user_id: &str,
        schedule_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TakenMap>;
}

/// Build a taken map from records, keeping the first record per key
pub fn collect_taken_map<'a>(
    records: impl IntoIterator<Item = &'a TakenRecord>,
    schedule_ids: &[String],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> TakenMap {
    let wanted: HashSet<&str> = schedule_ids.iter().map(String::as_str).collect();
    let mut map = TakenMap::new();

    for record in records {
        if !wanted.contains(record.schedule_id.as_str()) {
            continue;
        }
        if record.scheduled_for < from || record.scheduled_for >= to {
            continue;
        }
        map.entry(taken_key(&record.schedule_id, record.scheduled_for))
            .or_insert_with(|| TakenEntry::from(record));
    }

    map
}

// ============================================================================
// Forwarding impls so one value can serve several collaborator roles
// ============================================================================

macro_rules! forward_impls {
    ($($wrapper:ty),*) => {$(
        impl<R: ScheduleRepository + ?Sized> ScheduleRepository for $wrapper {
            fn find_schedule_by_id(&self, user_id: &str, schedule_id: &str) -> Result<Option<Schedule>> {
                (**self).find_schedule_by_id(user_id, schedule_id)
            }

            fn list_schedules_by_recipient(&self, user_id: &str, recipient_id: &str) -> Result<Vec<Schedule>> {
                (**self).list_schedules_by_recipient(user_id, recipient_id)
            }
        }

        impl<R: MedicationRepository + ?Sized> MedicationRepository for $wrapper {
            fn find_medication_by_id(&self, user_id: &str, medication_id: &str) -> Result<Option<Medication>> {
                (**self).find_medication_by_id(user_id, medication_id)
            }

            fn list_medications_by_recipient(
                &self,
                user_id: &str,
                recipient_id: &str,
                include_inactive: bool,
            ) -> Result<Vec<Medication>> {
                (**self).list_medications_by_recipient(user_id, recipient_id, include_inactive)
            }
        }

        impl<R: TakenEventStore + ?Sized> TakenEventStore for $wrapper {
            fn mark_taken(&self, user_id: &str, record: NewTakenRecord) -> Result<TakenRecord> {
                (**self).mark_taken(user_id, record)
            }

            fn get_taken_map(
                &self,
                user_id: &str,
                schedule_ids: &[String],
                from: DateTime<Utc>,
                to: DateTime<Utc>,
            ) -> Result<TakenMap> {
                (**self).get_taken_map(user_id, schedule_ids, from, to)
            }
        }
    )*};
}

forward_impls!(&R, Arc<R>);

// ============================================================================
// In-memory taken store
// ============================================================================

/// Mutex-guarded taken store, unique on `(schedule_id, scheduled_for)`
#[derive(Debug, Default)]
pub struct InMemoryTakenStore {
    records: Mutex<HashMap<String, TakenRecord>>,
}

impl InMemoryTakenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TakenRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.values().cloned().collect()
    }
}

impl TakenEventStore for InMemoryTakenStore {
    fn mark_taken(&self, _user_id: &str, record: NewTakenRecord) -> Result<TakenRecord> {
        let key = taken_key(&record.schedule_id, record.scheduled_for);
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let stored = records.entry(key).or_insert_with(|| record.into_record());
        Ok(stored.clone())
    }

    fn get_taken_map(
        &self,
        _user_id: &str,
        schedule_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TakenMap> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collect_taken_map(records.values(), schedule_ids, from, to))
    }
}
