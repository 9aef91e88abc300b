//! File-backed care plan: who may see which recipient, their medications and schedules.
//!
//! Loaded from TOML (or JSON when the file ends in `.json`). Every lookup is
//! scoped through the `access` table; a recipient the user has no access to
//! behaves exactly like one that does not exist.

use crate::recurrence::parse_timezone;
use crate::repository::{MedicationRepository, ScheduleRepository};
use crate::time_of_day::parse_time_of_day;
use crate::{Error, Medication, Recurrence, Result, Schedule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Recipients a caregiver may see
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Access {
    pub user_id: String,
    #[serde(default)]
    pub recipient_ids: Vec<String>,
}

/// The full care plan
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CarePlan {
    #[serde(default)]
    pub access: Vec<Access>,

    #[serde(default)]
    pub medications: Vec<Medication>,

    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

impl CarePlan {
    /// Load a care plan from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::CarePlan(format!("No care plan found at {:?}", path)));
        }

        let contents = std::fs::read_to_string(path)?;
        let plan: CarePlan = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };

        tracing::info!(
            "Loaded care plan from {:?}: {} medications, {} schedules",
            path,
            plan.medications.len(),
            plan.schedules.len()
        );
        Ok(plan)
    }

    fn can_access(&self, user_id: &str, recipient_id: &str) -> bool {
        self.access
            .iter()
            .any(|a| a.user_id == user_id && a.recipient_ids.iter().any(|r| r == recipient_id))
    }

    /// Validate the plan for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut medication_ids = HashSet::new();
        for med in &self.medications {
            if med.id.is_empty() {
                errors.push("Medication has empty ID".to_string());
            }
            if !medication_ids.insert(med.id.as_str()) {
                errors.push(format!("Duplicate medication ID '{}'", med.id));
            }
            if med.name.is_empty() {
                errors.push(format!("Medication '{}' has empty name", med.id));
            }
            if med.is_active != med.inactive_at.is_none() {
                errors.push(format!(
                    "Medication '{}': is_active and inactive_at disagree",
                    med.id
                ));
            }
        }

        let mut schedule_ids = HashSet::new();
        for schedule in &self.schedules {
            let id = &schedule.id;
            if id.is_empty() {
                errors.push("Schedule has empty ID".to_string());
            }
            if id.contains('|') {
                errors.push(format!("Schedule ID '{}' contains '|'", id));
            }
            if !schedule_ids.insert(id.as_str()) {
                errors.push(format!("Duplicate schedule ID '{}'", id));
            }

            match self.medications.iter().find(|m| m.id == schedule.medication_id) {
                None => errors.push(format!(
                    "Schedule '{}' references non-existent medication '{}'",
                    id, schedule.medication_id
                )),
                Some(med) if med.recipient_id != schedule.recipient_id => errors.push(format!(
                    "Schedule '{}' recipient '{}' differs from medication recipient '{}'",
                    id, schedule.recipient_id, med.recipient_id
                )),
                Some(_) => {}
            }

            if parse_time_of_day(&schedule.time_of_day).is_err() {
                errors.push(format!(
                    "Schedule '{}': malformed time of day '{}'",
                    id, schedule.time_of_day
                ));
            }

            if let Some(tz) = schedule.explicit_timezone() {
                if parse_timezone(tz).is_err() {
                    errors.push(format!("Schedule '{}': unknown timezone '{}'", id, tz));
                }
            }

            match (schedule.recurrence, schedule.days_of_week.as_deref()) {
                (Recurrence::Daily, Some(_)) => {
                    errors.push(format!("Daily schedule '{}' must not set days_of_week", id))
                }
                (Recurrence::Weekly, None) | (Recurrence::Weekly, Some([])) => errors.push(
                    format!("Weekly schedule '{}' needs at least one day of week", id),
                ),
                (Recurrence::Weekly, Some(days)) => {
                    for day in days.iter().filter(|d| !(1..=7).contains(*d)) {
                        errors.push(format!(
                            "Schedule '{}': day of week {} outside 1-7",
                            id, day
                        ));
                    }
                }
                (Recurrence::Daily, None) => {}
            }

            if let Some(end) = schedule.end_date {
                if end < schedule.start_date {
                    errors.push(format!(
                        "Schedule '{}': end_date {} before start_date {}",
                        id, end, schedule.start_date
                    ));
                }
            }
        }

        errors
    }
}

impl ScheduleRepository for CarePlan {
    fn find_schedule_by_id(&self, user_id: &str, schedule_id: &str) -> Result<Option<Schedule>> {
        Ok(self
            .schedules
            .iter()
            .find(|s| s.id == schedule_id && self.can_access(user_id, &s.recipient_id))
            .cloned())
    }

    fn list_schedules_by_recipient(&self, user_id: &str, recipient_id: &str) -> Result<Vec<Schedule>> {
        if !self.can_access(user_id, recipient_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .schedules
            .iter()
            .filter(|s| s.recipient_id == recipient_id)
            .cloned()
            .collect())
    }
}

impl MedicationRepository for CarePlan {
    fn find_medication_by_id(&self, user_id: &str, medication_id: &str) -> Result<Option<Medication>> {
        Ok(self
            .medications
            .iter()
            .find(|m| m.id == medication_id && self.can_access(user_id, &m.recipient_id))
            .cloned())
    }

    fn list_medications_by_recipient(
        &self,
        user_id: &str,
        recipient_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<Medication>> {
        if !self.can_access(user_id, recipient_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .medications
            .iter()
            .filter(|m| m.recipient_id == recipient_id)
            .filter(|m| include_inactive || !m.is_inactive())
            .cloned()
            .collect())
    }
}
