use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 100-nanosecond intervals between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_OFFSET: u64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: u64 = 10_000_000;

/// A point in time in FILETIME form: 100ns ticks since 1601-01-01 UTC.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTime(u64);

impl FileTime {
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Convert from a UTC timestamp. Instants before 1601 clamp to zero.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp();
        let sub = u64::from(dt.timestamp_subsec_nanos() / 100);
        let ticks = if secs >= 0 {
            UNIX_EPOCH_OFFSET + secs as u64 * TICKS_PER_SECOND + sub
        } else {
            let before = secs.unsigned_abs() * TICKS_PER_SECOND;
            UNIX_EPOCH_OFFSET.saturating_sub(before) + sub
        };
        Self(ticks)
    }

    /// Convert to a UTC timestamp, if representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let unix_ticks = self.0 as i128 - UNIX_EPOCH_OFFSET as i128;
        let secs = unix_ticks.div_euclid(TICKS_PER_SECOND as i128);
        let nanos = unix_ticks.rem_euclid(TICKS_PER_SECOND as i128) * 100;
        DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos as u32)
    }
}

impl fmt::Debug for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileTime({})", self.0)
    }
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unix_epoch_maps_to_offset() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(FileTime::from_datetime(epoch).ticks(), UNIX_EPOCH_OFFSET);
    }

    #[test]
    fn datetime_conversion_preserves_tick_precision() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::nanoseconds(1_234_500);
        let ft = FileTime::from_datetime(dt);
        assert_eq!(ft.to_datetime().unwrap(), dt);
    }

    #[test]
    fn now_is_after_2020() {
        let floor = FileTime::from_datetime(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert!(FileTime::now() > floor);
    }

    #[test]
    fn display_is_iso8601() {
        let ft = FileTime::from_ticks(UNIX_EPOCH_OFFSET);
        assert_eq!(ft.to_string(), "1970-01-01T00:00:00.000Z");
    }
}
