//! Error types for the dose_core library.

use chrono::{DateTime, Utc};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dose_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schedule's time of day is not strict `HH:MM`
    #[error("Malformed time of day: {0:?}")]
    MalformedTimeOfDay(String),

    /// Query window with `from` after `to`
    #[error("Invalid window: from {from} is after to {to}")]
    InvalidWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// Opaque dose id is malformed or tampered with
    #[error("Invalid dose id: {0}")]
    InvalidDoseId(String),

    /// Dose id decodes but no authorized schedule matches it
    #[error("Dose not found")]
    DoseNotFound,

    /// Schedule references a medication that does not exist
    #[error("Medication not found: {0}")]
    MedicationNotFound(String),

    /// Dose falls after the medication's deactivation cutoff
    #[error("Medication {medication_id} was deactivated at {inactive_at}")]
    InactiveMedication {
        medication_id: String,
        inactive_at: DateTime<Utc>,
    },

    /// Schedule names a timezone that is not in the IANA database
    #[error("Unknown timezone: {0:?}")]
    UnknownTimezone(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Care plan loading or validation error
    #[error("Care plan error: {0}")]
    CarePlan(String),
}

/// Externally observable category of an [`Error`].
///
/// Outer layers branch on this rather than on individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller supplied bad input; correct it and try again
    InvalidInput,
    /// The named thing does not exist (or is not visible to the caller)
    NotFound,
    /// Request conflicts with the current state of the data
    Conflict,
    /// Storage, configuration or data-integrity failure
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidWindow { .. } | Error::InvalidDoseId(_) => ErrorClass::InvalidInput,
            Error::DoseNotFound | Error::MedicationNotFound(_) => ErrorClass::NotFound,
            Error::InactiveMedication { .. } => ErrorClass::Conflict,
            Error::MalformedTimeOfDay(_)
            | Error::UnknownTimezone(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Csv(_)
            | Error::Toml(_)
            | Error::Config(_)
            | Error::CarePlan(_) => ErrorClass::Internal,
        }
    }
}
