use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tomato_core::ids::{StatisticsId, UsageRecordId};
use tomato_core::measurement::Measurement;

use crate::bucket::BucketType;

/// One completed measurement range for a statistic: `[begin, end)` at a
/// given [`BucketType`] granularity, holding the combined measurement and
/// the number of finer-grained samples folded into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub statistics_id: StatisticsId,
    pub bucket_type: BucketType,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub measurement: Measurement,
    pub samples: u32,
}

impl UsageRecord {
    pub fn new(
        statistics_id: StatisticsId,
        bucket_type: BucketType,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        measurement: Measurement,
        samples: u32,
    ) -> Self {
        Self {
            id: UsageRecordId::new(),
            statistics_id,
            bucket_type,
            begin,
            end,
            measurement,
            samples,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.begin
    }
}
