//! Calendar-day attribution of event timestamps.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use streakproj_core::DomainError;

use crate::ProjectionError;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A calendar day in a subject's local timezone, rendered as `YYYY-MM-DD`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl core::fmt::Display for DayKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Fixed width keeps keys comparable as strings by whoever stores them.
        if s.len() != 10 {
            return Err(DomainError::validation(format!(
                "day key '{s}' is not in YYYY-MM-DD form"
            )));
        }
        NaiveDate::parse_from_str(s, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|e| DomainError::validation(format!("day key '{s}': {e}")))
    }
}

impl TryFrom<String> for DayKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}

/// Day-key of `occurred_at` as observed in `tz`.
pub fn day_key(occurred_at: DateTime<Utc>, tz: Tz) -> DayKey {
    DayKey(occurred_at.with_timezone(&tz).date_naive())
}

/// Resolve an IANA timezone name (e.g. `Asia/Seoul`).
pub fn parse_timezone(name: &str) -> Result<Tz, ProjectionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProjectionError::ClockAmbiguity(
            "timezone name is empty".to_string(),
        ));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|e| ProjectionError::ClockAmbiguity(format!("unknown timezone '{trimmed}': {e}")))
}
