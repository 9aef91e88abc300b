//! Strict `HH:MM` 24-hour time-of-day parsing.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A validated wall-clock time of day (hour 0-23, minute 0-59)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::MalformedTimeOfDay(format!("{}:{}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

/// Parse a strict `HH:MM` string.
///
/// Exactly five ASCII characters: two digits, a colon, two digits.
/// `24:00`, `9:00`, surrounding whitespace and seconds are all rejected.
pub fn parse_time_of_day(input: &str) -> Result<TimeOfDay> {
    let malformed = || Error::MalformedTimeOfDay(input.to_string());

    let bytes = input.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(malformed());
    }

    let two_digits = |hi: u8, lo: u8| -> Option<u32> {
        if hi.is_ascii_digit() && lo.is_ascii_digit() {
            Some(u32::from(hi - b'0') * 10 + u32::from(lo - b'0'))
        } else {
            None
        }
    };

    let hour = two_digits(bytes[0], bytes[1]).ok_or_else(malformed)?;
    let minute = two_digits(bytes[3], bytes[4]).ok_or_else(malformed)?;

    TimeOfDay::new(hour, minute).map_err(|_| malformed())
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_time_of_day(s)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
