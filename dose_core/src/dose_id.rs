//! Opaque, reversible dose identifiers.
//!
//! A dose is never stored until it is taken, so clients name it with a token
//! that encodes `(schedule_id, scheduled_for)`:
//!
//! ```text
//! v1.<base64url-nopad("<schedule_id>|<RFC 3339 UTC, millisecond precision>")>
//! ```
//!
//! Schedule ids must not contain `|`. Callers guarantee this; it is not
//! checked at encode time.

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const PREFIX: &str = "v1.";
const DELIMITER: char = '|';

/// Canonical instant format shared by dose ids and taken-map keys
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Key used to match a computed dose against the taken map
pub fn taken_key(schedule_id: &str, scheduled_for: DateTime<Utc>) -> String {
    format!("{}{}{}", schedule_id, DELIMITER, format_instant(scheduled_for))
}

/// Opaque token naming a not-yet-materialized dose
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoseId(String);

impl DoseId {
    pub fn encode(schedule_id: &str, scheduled_for: DateTime<Utc>) -> Self {
        let payload = taken_key(schedule_id, scheduled_for);
        DoseId(format!("{}{}", PREFIX, URL_SAFE_NO_PAD.encode(payload)))
    }

    /// Recover `(schedule_id, scheduled_for)` from the token
    pub fn decode(&self) -> Result<(String, DateTime<Utc>)> {
        let invalid = |reason: &str| Error::InvalidDoseId(reason.to_string());

        let payload = self
            .0
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid("missing version prefix"))?;
        if payload.is_empty() {
            return Err(invalid("empty payload"));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| invalid("payload is not base64url"))?;
        let text = String::from_utf8(bytes).map_err(|_| invalid("payload is not UTF-8"))?;

        let parts: Vec<&str> = text.split(DELIMITER).collect();
        let [schedule_id, timestamp] = parts.as_slice() else {
            return Err(invalid("payload must have exactly two parts"));
        };
        if schedule_id.is_empty() || timestamp.is_empty() {
            return Err(invalid("empty payload part"));
        }

        let scheduled_for = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| invalid("timestamp is not RFC 3339"))?
            .with_timezone(&Utc);
        if scheduled_for.timestamp_subsec_nanos() % 1_000_000 != 0 {
            return Err(invalid("timestamp finer than milliseconds"));
        }

        Ok((schedule_id.to_string(), scheduled_for))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DoseId {
    fn from(token: String) -> Self {
        DoseId(token)
    }
}

impl From<&str> for DoseId {
    fn from(token: &str) -> Self {
        DoseId(token.to_string())
    }
}

impl fmt::Display for DoseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
