#![forbid(unsafe_code)]

//! Core scheduling and reconciliation logic for medication doses.
//!
//! This crate provides:
//! - Domain types (schedules, medications, dose occurrences, taken records)
//! - DST-safe recurrence expansion over half-open UTC windows
//! - Opaque, reversible dose identifiers
//! - The dose service (listing and idempotent mark-taken)
//! - File-backed collaborators (care plan, JSONL taken log) and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod time_of_day;
pub mod resolver;
pub mod recurrence;
pub mod dose_id;
pub mod repository;
pub mod service;
pub mod care_plan;
pub mod taken_log;
pub mod export;

// Re-export commonly used types
pub use error::{Error, ErrorClass, Result};
pub use types::*;
pub use config::Config;
pub use time_of_day::{parse_time_of_day, TimeOfDay};
pub use recurrence::{generate, generate_with_default};
pub use dose_id::DoseId;
pub use repository::{InMemoryTakenStore, MedicationRepository, ScheduleRepository, TakenEventStore};
pub use service::{Clock, DoseService, FixedClock, SystemClock};
pub use care_plan::CarePlan;
pub use taken_log::JsonlTakenStore;
pub use export::export_doses_csv;
