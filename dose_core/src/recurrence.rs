//! Recurrence engine: expands a schedule into the instants it fires within a window.
//!
//! Windows are half-open `[from, to)`, so adjacent windows tile without
//! overlap or gaps. The engine walks local calendar dates one at a time and
//! resolves each included date through [`resolve_local`], which is where all
//! DST handling lives. At most one instant is produced per local date, so the
//! output is ascending.

use crate::resolver::resolve_local;
use crate::time_of_day::parse_time_of_day;
use crate::{Error, Recurrence, Result, Schedule};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

/// Zone used when a schedule does not name one
pub const DEFAULT_TIMEZONE: Tz = Tz::UTC;

/// Parse an IANA zone name
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}

/// Effective zone for `schedule`, falling back to `default_tz`
pub fn schedule_timezone(schedule: &Schedule, default_tz: Tz) -> Result<Tz> {
    match schedule.explicit_timezone() {
        Some(name) => parse_timezone(name),
        None => Ok(default_tz),
    }
}

/// Every instant `schedule` fires in `[from, to)`, ascending.
pub fn generate(
    schedule: &Schedule,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    generate_with_default(schedule, from, to, DEFAULT_TIMEZONE)
}

/// Like [`generate`], with a caller-chosen default zone
pub fn generate_with_default(
    schedule: &Schedule,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    default_tz: Tz,
) -> Result<Vec<DateTime<Utc>>> {
    if from > to {
        return Err(Error::InvalidWindow { from, to });
    }
    if from == to {
        return Ok(Vec::new());
    }

    let tz = schedule_timezone(schedule, default_tz)?;
    let time = parse_time_of_day(&schedule.time_of_day)?;

    let first_day = from.with_timezone(&tz).date_naive();
    let last_day = to.with_timezone(&tz).date_naive();

    let mut occurrences = Vec::new();
    let mut day = first_day;

    while day <= last_day {
        if schedule.end_date.is_some_and(|end| day > end) {
            break;
        }

        if day >= schedule.start_date && fires_on(schedule, day.weekday().number_from_monday()) {
            let instant = resolve_local(day, time, tz);
            if instant >= from && instant < to {
                occurrences.push(instant);
            }
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    tracing::debug!(
        "Schedule {} produced {} occurrences in [{}, {})",
        schedule.id,
        occurrences.len(),
        from,
        to
    );

    Ok(occurrences)
}

fn fires_on(schedule: &Schedule, iso_weekday: u32) -> bool {
    match schedule.recurrence {
        Recurrence::Daily => true,
        Recurrence::Weekly => schedule
            .days_of_week
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|d| u32::from(*d) == iso_weekday),
    }
}
