//! DST-safe conversion from a local wall-clock time to an absolute instant.
//!
//! Policy:
//! - Ambiguous local times (fall-back) resolve to the **earlier** instant.
//! - Non-existent local times (spring-forward) snap forward to the first
//!   minute that exists, searching at most [`GAP_SEARCH_MINUTES`].
//!
//! Dose ids are derived from the resolved instant, so this policy must stay
//! stable: a dose listed yesterday has to resolve to the same instant today.

use crate::TimeOfDay;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Upper bound on the spring-forward gap search
pub const GAP_SEARCH_MINUTES: i64 = 180;

/// Resolve `time` on local `date` in `tz` to a UTC instant.
pub fn resolve_local(date: NaiveDate, time: TimeOfDay, tz: Tz) -> DateTime<Utc> {
    let nominal = date.and_hms_opt(time.hour(), time.minute(), 0);

    if let Some(nominal) = nominal {
        if let Some(instant) = earliest(tz, nominal) {
            return instant;
        }

        // Inside a spring-forward gap
        for step in 1..=GAP_SEARCH_MINUTES {
            if let Some(instant) = earliest(tz, nominal + Duration::minutes(step)) {
                tracing::debug!(
                    "Local time {} {} does not exist in {}, snapped forward {} min",
                    date,
                    time,
                    tz,
                    step
                );
                return instant;
            }
        }
    }

    tracing::warn!(
        "No valid local time near {} {} in {}, falling back to local midnight",
        date,
        time,
        tz
    );
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    earliest(tz, midnight).unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn earliest(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(a, b) => Some(a.with_timezone(&Utc).min(b.with_timezone(&Utc))),
        LocalResult::None => None,
    }
}
