use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The granularities a usage statistic is rolled up into. `Single` holds
/// the most recent raw per-tick samples; every coarser bucket is produced
/// by combining completed ranges of the next-finer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BucketType {
    Single,
    FiveMinutes,
    Hour,
    Day,
    Month,
    Year,
}

impl BucketType {
    pub const ALL: [BucketType; 6] = [
        BucketType::Single,
        BucketType::FiveMinutes,
        BucketType::Hour,
        BucketType::Day,
        BucketType::Month,
        BucketType::Year,
    ];

    /// How many completed records of this bucket type to retain.
    pub fn keep_records(&self) -> usize {
        match self {
            BucketType::Single => 15,
            BucketType::FiveMinutes => 12,
            BucketType::Hour => 24,
            BucketType::Day => 30,
            BucketType::Month => 12,
            BucketType::Year => 5,
        }
    }

    /// The finer bucket type combined to produce a record of this type.
    /// `Single` has none — it is fed directly from per-tick samples.
    pub fn source(&self) -> Option<BucketType> {
        match self {
            BucketType::Single => None,
            BucketType::FiveMinutes => Some(BucketType::Single),
            BucketType::Hour => Some(BucketType::FiveMinutes),
            BucketType::Day => Some(BucketType::Hour),
            BucketType::Month => Some(BucketType::Day),
            BucketType::Year => Some(BucketType::Month),
        }
    }

    /// The coarser buckets that need re-checking after a sample lands,
    /// finest first.
    pub fn promotion_chain() -> [BucketType; 5] {
        [
            BucketType::FiveMinutes,
            BucketType::Hour,
            BucketType::Day,
            BucketType::Month,
            BucketType::Year,
        ]
    }

    /// Floors `at` down to the start of the bucket boundary it falls in.
    pub fn floor(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            BucketType::Single => at,
            BucketType::FiveMinutes => {
                let minute = (at.minute() / 5) * 5;
                at.with_minute(minute)
                    .unwrap()
                    .with_second(0)
                    .unwrap()
                    .with_nanosecond(0)
                    .unwrap()
            }
            BucketType::Hour => at
                .with_minute(0)
                .unwrap()
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap(),
            BucketType::Day => Utc
                .with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
                .unwrap(),
            BucketType::Month => Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0).unwrap(),
            BucketType::Year => Utc.with_ymd_and_hms(at.year(), 1, 1, 0, 0, 0).unwrap(),
        }
    }

    /// Steps `boundary` (assumed already floored) back by one bucket unit.
    pub fn step_back(&self, boundary: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            BucketType::Single => boundary,
            BucketType::FiveMinutes => boundary - chrono::Duration::minutes(5),
            BucketType::Hour => boundary - chrono::Duration::hours(1),
            BucketType::Day => boundary - chrono::Duration::days(1),
            BucketType::Month => {
                let (year, month) = if boundary.month() == 1 {
                    (boundary.year() - 1, 12)
                } else {
                    (boundary.year(), boundary.month() - 1)
                };
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
            }
            BucketType::Year => Utc
                .with_ymd_and_hms(boundary.year() - 1, 1, 1, 0, 0, 0)
                .unwrap(),
        }
    }

    /// The most recently *completed* `[begin, end)` range of this bucket
    /// type as of `now` — i.e. the range immediately before the one `now`
    /// currently falls in.
    pub fn last_completed_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.floor(now);
        let begin = self.step_back(end);
        (begin, end)
    }
}

impl fmt::Display for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketType::Single => "single",
            BucketType::FiveMinutes => "5minutes",
            BucketType::Hour => "hour",
            BucketType::Day => "day",
            BucketType::Month => "month",
            BucketType::Year => "year",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_records_matches_retention_table() {
        assert_eq!(BucketType::Single.keep_records(), 15);
        assert_eq!(BucketType::FiveMinutes.keep_records(), 12);
        assert_eq!(BucketType::Hour.keep_records(), 24);
        assert_eq!(BucketType::Day.keep_records(), 30);
        assert_eq!(BucketType::Month.keep_records(), 12);
        assert_eq!(BucketType::Year.keep_records(), 5);
    }

    #[test]
    fn five_minute_floor_rounds_down() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 10, 37, 42).unwrap();
        let floored = BucketType::FiveMinutes.floor(at);
        assert_eq!(floored, Utc.with_ymd_and_hms(2026, 7, 28, 10, 35, 0).unwrap());
    }

    #[test]
    fn month_step_back_crosses_year_boundary() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let prev = BucketType::Month.step_back(jan);
        assert_eq!(prev, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn last_completed_range_is_before_now() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 37, 0).unwrap();
        let (begin, end) = BucketType::Hour.last_completed_range(now);
        assert_eq!(begin, Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap());
    }
}
