//! Dose reconciliation: computed occurrences merged with the taken log.
//!
//! ## Listing
//!
//! 1. Resolve the window (`from` defaults to now, `to` to `from` + window length)
//! 2. Fetch schedules and medications for the recipient concurrently
//! 3. Fetch the taken map for every schedule in the window
//! 4. Skip orphaned schedules and, unless asked, schedules of inactive medications
//! 5. Expand each schedule, drop doses after the deactivation cutoff, merge taken state
//! 6. Sort ascending by `scheduled_for`
//!
//! ## Marking taken
//!
//! Decode the dose id, authorize via the schedule lookup, reject doses after
//! the deactivation cutoff, then insert idempotently.

use crate::recurrence::{generate_with_default, DEFAULT_TIMEZONE};
use crate::repository::{MedicationRepository, ScheduleRepository, TakenEventStore};
use crate::{
    dose_id::taken_key, DoseId, DoseOccurrence, DoseStatus, DoseWindow, Error, Medication,
    NewTakenRecord, Result, Schedule, TakenRecord,
};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Default listing window length
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Lists doses and records them as taken
pub struct DoseService<S, M, T> {
    schedules: S,
    medications: M,
    taken: T,
    clock: Arc<dyn Clock>,
    default_tz: Tz,
    window_length: Duration,
}

impl<S, M, T> DoseService<S, M, T>
where
    S: ScheduleRepository,
    M: MedicationRepository,
    T: TakenEventStore,
{
    pub fn new(schedules: S, medications: M, taken: T) -> Self {
        Self {
            schedules,
            medications,
            taken,
            clock: Arc::new(SystemClock),
            default_tz: DEFAULT_TIMEZONE,
            window_length: Duration::days(DEFAULT_WINDOW_DAYS),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Zone for schedules that do not name one
    pub fn with_default_timezone(mut self, tz: Tz) -> Self {
        self.default_tz = tz;
        self
    }

    /// Length of the window when the caller gives no `to`
    pub fn with_window_length(mut self, length: Duration) -> Self {
        self.window_length = length;
        self
    }

    /// Every dose for `recipient_id` in the window, ascending by `scheduled_for`.
    pub fn list_upcoming(
        &self,
        user_id: &str,
        recipient_id: &str,
        window: DoseWindow,
        include_inactive: bool,
    ) -> Result<Vec<DoseOccurrence>> {
        let (from, to) = window.resolve(self.clock.now(), self.window_length);
        if from > to {
            return Err(Error::InvalidWindow { from, to });
        }

        let (schedules, medications) = thread::scope(|scope| {
            let schedules = scope
                .spawn(|| self.schedules.list_schedules_by_recipient(user_id, recipient_id));
            let medications = scope.spawn(|| {
                self.medications
                    .list_medications_by_recipient(user_id, recipient_id, true)
            });
            (join(schedules), join(medications))
        });
        let schedules = schedules?;
        let medications = medications?;

        if schedules.is_empty() {
            tracing::debug!("Recipient {} has no schedules", recipient_id);
            return Ok(Vec::new());
        }

        let medications: HashMap<&str, &Medication> =
            medications.iter().map(|m| (m.id.as_str(), m)).collect();

        let schedule_ids: Vec<String> = schedules.iter().map(|s| s.id.clone()).collect();
        let taken = self.taken.get_taken_map(user_id, &schedule_ids, from, to)?;

        let mut doses = Vec::new();
        for schedule in &schedules {
            let Some(medication) = medications.get(schedule.medication_id.as_str()) else {
                tracing::debug!(
                    "Skipping schedule {}: medication {} not found",
                    schedule.id,
                    schedule.medication_id
                );
                continue;
            };
            if medication.is_inactive() && !include_inactive {
                tracing::debug!(
                    "Skipping schedule {}: medication {} is inactive",
                    schedule.id,
                    medication.id
                );
                continue;
            }

            for scheduled_for in generate_with_default(schedule, from, to, self.default_tz)? {
                if medication.is_past_cutoff(scheduled_for) {
                    continue;
                }

                let mut dose = scheduled_dose(schedule, medication, scheduled_for);
                if let Some(entry) = taken.get(&taken_key(&schedule.id, scheduled_for)) {
                    dose.status = DoseStatus::Taken;
                    dose.taken_at = Some(entry.taken_at);
                    dose.taken_by_user_id = Some(entry.taken_by_user_id.clone());
                }
                doses.push(dose);
            }
        }

        doses.sort_by(|a, b| {
            a.scheduled_for
                .cmp(&b.scheduled_for)
                .then_with(|| a.schedule_id.cmp(&b.schedule_id))
        });

        tracing::info!(
            "Listed {} doses for recipient {} in [{}, {})",
            doses.len(),
            recipient_id,
            from,
            to
        );

        Ok(doses)
    }

    /// Record the dose named by `dose_id` as taken by `user_id`.
    ///
    /// Safe to retry: a dose already taken comes back with its original
    /// `taken_at` and `taken_by_user_id`.
    pub fn mark_taken(&self, user_id: &str, dose_id: &DoseId) -> Result<DoseOccurrence> {
        let (schedule_id, scheduled_for) = dose_id.decode()?;

        let schedule = self
            .schedules
            .find_schedule_by_id(user_id, &schedule_id)?
            .ok_or(Error::DoseNotFound)?;

        let medication = self
            .medications
            .find_medication_by_id(user_id, &schedule.medication_id)?
            .ok_or_else(|| Error::MedicationNotFound(schedule.medication_id.clone()))?;

        if let Some(inactive_at) = medication.inactive_at {
            if inactive_at < scheduled_for {
                return Err(Error::InactiveMedication {
                    medication_id: medication.id.clone(),
                    inactive_at,
                });
            }
        }

        let record = self.taken.mark_taken(
            user_id,
            NewTakenRecord {
                schedule_id: schedule.id.clone(),
                scheduled_for,
                taken_at: self.clock.now(),
                taken_by_user_id: user_id.to_string(),
                recipient_id: medication.recipient_id.clone(),
                medication_id: medication.id.clone(),
            },
        )?;

        tracing::info!(
            "Dose {} of schedule {} marked taken by {}",
            scheduled_for,
            schedule.id,
            record.taken_by_user_id
        );

        Ok(taken_dose(&schedule, &medication, &record))
    }
}

fn join<R>(handle: thread::ScopedJoinHandle<'_, Result<R>>) -> Result<R> {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn scheduled_dose(
    schedule: &Schedule,
    medication: &Medication,
    scheduled_for: DateTime<Utc>,
) -> DoseOccurrence {
    DoseOccurrence {
        dose_id: DoseId::encode(&schedule.id, scheduled_for),
        schedule_id: schedule.id.clone(),
        medication_id: medication.id.clone(),
        recipient_id: medication.recipient_id.clone(),
        medication_name: medication.name.clone(),
        scheduled_for,
        status: DoseStatus::Scheduled,
        taken_at: None,
        taken_by_user_id: None,
    }
}

fn taken_dose(schedule: &Schedule, medication: &Medication, record: &TakenRecord) -> DoseOccurrence {
    DoseOccurrence {
        status: DoseStatus::Taken,
        taken_at: Some(record.taken_at),
        taken_by_user_id: Some(record.taken_by_user_id.clone()),
        ..scheduled_dose(schedule, medication, record.scheduled_for)
    }
}
