//! Module containing the BSON datetime type.

use std::fmt;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A BSON UTC datetime: a signed count of milliseconds since the Unix epoch.
///
/// Conversions from finer-grained time representations truncate to millisecond
/// precision, matching what the wire format can carry.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DateTime(i64);

impl DateTime {
    /// The current time, truncated to the millisecond.
    pub fn now() -> Self {
        Self::from_chrono(Utc::now())
    }

    /// Constructs a `DateTime` from the given number of milliseconds since the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The number of milliseconds since the Unix epoch.
    pub const fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// Converts from a [`chrono::DateTime`], truncating to the millisecond.
    pub fn from_chrono<Tz: TimeZone>(value: chrono::DateTime<Tz>) -> Self {
        Self(value.timestamp_millis())
    }

    /// Converts to a [`chrono::DateTime`], saturating at the bounds `chrono` can represent.
    pub fn to_chrono(self) -> chrono::DateTime<Utc> {
        match Utc.timestamp_millis_opt(self.0).single() {
            Some(value) => value,
            None if self.0 < 0 => chrono::DateTime::<Utc>::MIN_UTC,
            None => chrono::DateTime::<Utc>::MAX_UTC,
        }
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateTime").field(&self.to_chrono()).finish()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_chrono().to_rfc3339())
    }
}

impl<Tz: TimeZone> From<chrono::DateTime<Tz>> for DateTime {
    fn from(value: chrono::DateTime<Tz>) -> Self {
        Self::from_chrono(value)
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self(i64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::DateTime;

    #[test]
    fn chrono_round_trip_truncates_to_millis() {
        let chrono_dt = chrono::DateTime::parse_from_rfc3339("2014-11-28T12:00:09.123456Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let dt = DateTime::from_chrono(chrono_dt);
        assert_eq!(dt.timestamp_millis(), 1417176009123);
        assert_eq!(dt.to_chrono().timestamp_subsec_micros(), 123000);
    }

    #[test]
    fn saturates_out_of_range() {
        assert_eq!(
            DateTime::from_millis(i64::MAX).to_chrono(),
            chrono::DateTime::<chrono::Utc>::MAX_UTC
        );
        assert_eq!(
            DateTime::from_millis(i64::MIN).to_chrono(),
            chrono::DateTime::<chrono::Utc>::MIN_UTC
        );
    }
}
