// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use chrono::DateTime;
use chrono::Utc;
use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::Fallible;

/// Milliseconds in a day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// An instant, with millisecond precision. Stored in the database as an
/// integer so that comparisons against `due` are index range scans.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn parse_rfc3339(s: &str) -> Fallible<Self> {
        let ts = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(ts.timestamp_millis()))
    }

    pub fn to_rfc3339(self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(ts) => ts.to_rfc3339(),
            None => format!("{}ms", self.0),
        }
    }

    /// Add a (possibly fractional) number of days, rounded to the nearest
    /// millisecond.
    pub fn plus_days(self, days: f64) -> Self {
        Self(self.0 + (days * MS_PER_DAY as f64).round() as i64)
    }

    /// Add a whole number of days.
    pub fn plus_whole_days(self, days: i64) -> Self {
        Self(self.0 + days * MS_PER_DAY)
    }

    /// The signed, fractional number of days from `earlier` to `self`.
    pub fn days_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0) as f64 / MS_PER_DAY as f64
    }

    /// The number of whole days elapsed from `earlier` to `self`, rounded
    /// towards negative infinity.
    pub fn whole_days_since(self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0).div_euclid(MS_PER_DAY)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl TryFrom<&str> for Timestamp {
    type Error = ErrorReport;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Timestamp::parse_rfc3339(value)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(ms) => Ok(Timestamp(ms)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plus_days() {
        let t = Timestamp::from_millis(0);
        assert_eq!(t.plus_whole_days(5).as_millis(), 5 * MS_PER_DAY);
        assert_eq!(t.plus_days(10.0 / 1440.0).as_millis(), 600_000);
    }

    #[test]
    fn test_whole_days_since_floors() {
        let start = Timestamp::from_millis(0);
        let later = Timestamp::from_millis(5 * MS_PER_DAY + 3_600_000);
        assert_eq!(later.whole_days_since(start), 5);
        let earlier = Timestamp::from_millis(-1);
        assert_eq!(earlier.whole_days_since(start), -1);
    }

    #[test]
    fn test_rfc3339_round_trip() -> Fallible<()> {
        let t = Timestamp::parse_rfc3339("2025-01-02T03:04:05.678Z")?;
        assert_eq!(t.to_rfc3339(), "2025-01-02T03:04:05.678+00:00");
        Ok(())
    }
}
