use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tomato_core::ids::StatisticsId;
use tomato_core::measurement::Measurement;

use crate::bucket::BucketType;
use crate::combine::combine;
use crate::record::UsageRecord;

/// The rolled-up usage history for one element, connection, or topology.
/// Every 60-second tick feeds a raw sample in; [`UsageStatistics::update`]
/// both records it and promotes any coarser bucket whose range just
/// completed, pruning each bucket back to its retention count afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub id: StatisticsId,
    records: HashMap<BucketType, Vec<UsageRecord>>,
}

impl UsageStatistics {
    pub fn new() -> Self {
        Self::with_id(StatisticsId::new())
    }

    /// Builds empty usage history under a pre-assigned id, so a caller that
    /// already owns a [`StatisticsId`] (an element, connection, or topology
    /// sampling for the first time) can key its store lookup before any
    /// sample exists.
    pub fn with_id(id: StatisticsId) -> Self {
        Self {
            id,
            records: HashMap::new(),
        }
    }

    pub fn records(&self, bucket: BucketType) -> &[UsageRecord] {
        self.records.get(&bucket).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The latest raw single-tick sample, if any has been recorded yet.
    pub fn last_single(&self) -> Option<&UsageRecord> {
        self.records(BucketType::Single).last()
    }

    /// Records one tick's measurement and rolls any now-complete coarser
    /// ranges up from it. Retention pruning runs last, after promotion has
    /// had a chance to read the full, unpruned source set for every bucket
    /// it combines from — pruning the `single` ring before a 5-minute (or
    /// coarser) boundary closes would starve `combine` of samples it needs.
    pub fn update(&mut self, sample: Measurement, begin: DateTime<Utc>, end: DateTime<Utc>) {
        let record = UsageRecord::new(self.id, BucketType::Single, begin, end, sample, 1);
        self.append(BucketType::Single, record);
        self.promote(end);
        self.prune_all();
    }

    /// Ingests an already-combined `single` record rather than a raw
    /// [`Measurement`] — used by a Topology, which derives its own sample
    /// by combining its elements' and connections' latest single records
    /// instead of sampling a host directly.
    pub fn ingest(&mut self, record: UsageRecord) {
        let end = record.end;
        self.append(BucketType::Single, record);
        self.promote(end);
        self.prune_all();
    }

    fn promote(&mut self, now: DateTime<Utc>) {
        for bucket in BucketType::promotion_chain() {
            let source = bucket.source().expect("non-Single bucket always has a source");
            let (range_begin, range_end) = bucket.last_completed_range(now);
            if range_end > now {
                continue;
            }
            if self.has_record_covering(bucket, range_end) {
                continue;
            }
            let sources: Vec<UsageRecord> = self
                .records(source)
                .iter()
                .filter(|r| r.begin >= range_begin && r.end <= range_end)
                .cloned()
                .collect();
            if sources.is_empty() {
                continue;
            }
            let combined = combine(self.id, bucket, range_begin, range_end, &sources);
            tracing::debug!(%bucket, samples = combined.samples, "promoted usage records");
            self.append(bucket, combined);
        }
    }

    fn has_record_covering(&self, bucket: BucketType, range_end: DateTime<Utc>) -> bool {
        self.records(bucket)
            .last()
            .is_some_and(|r| r.end >= range_end)
    }

    /// Adds `record` without pruning. Promotion depends on reading a
    /// bucket's complete set of not-yet-retired records, so pruning is
    /// deferred to [`Self::prune_all`] until every bucket has had its turn
    /// to combine from its source this tick.
    fn append(&mut self, bucket: BucketType, record: UsageRecord) {
        self.records.entry(bucket).or_default().push(record);
    }

    /// Retires every bucket type back down to its `KEEP_RECORDS` count,
    /// oldest first. Called once per tick, after promotion has finished
    /// combining from every bucket's full history.
    fn prune_all(&mut self) {
        for bucket in BucketType::ALL {
            let keep = bucket.keep_records();
            if let Some(list) = self.records.get_mut(&bucket) {
                if list.len() > keep {
                    let excess = list.len() - keep;
                    list.drain(0..excess);
                }
            }
        }
    }
}

impl Default for UsageStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn measurement(cputime: f64) -> Measurement {
        Measurement {
            cputime,
            memory: 128.0,
            diskspace: 0.0,
            traffic: 0.0,
        }
    }

    #[test]
    fn single_bucket_retains_only_last_fifteen() {
        let mut stats = UsageStatistics::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        for i in 0..20 {
            let begin = t0 + chrono::Duration::minutes(i);
            let end = begin + chrono::Duration::minutes(1);
            stats.update(measurement(1.0), begin, end);
        }
        assert_eq!(stats.records(BucketType::Single).len(), 15);
    }

    #[test]
    fn ingest_stores_and_promotes_a_precomputed_record() {
        use crate::record::UsageRecord;

        let mut stats = UsageStatistics::new();
        let begin = Utc.with_ymd_and_hms(2026, 7, 28, 11, 0, 0).unwrap();
        let end = begin + chrono::Duration::minutes(1);
        let record = UsageRecord::new(stats.id, BucketType::Single, begin, end, measurement(4.0), 1);
        stats.ingest(record);
        assert_eq!(stats.last_single().unwrap().measurement.cputime, 4.0);
    }

    /// Literal end-to-end scenario 5: 60 five-second ticks spanning one
    /// 5-minute window, memory 100 for the first half and 200 for the
    /// second. The promoted record's memory is the samples-weighted mean,
    /// not a plain average of the two halves' endpoints.
    #[test]
    fn usage_promotion_weights_memory_by_sample_count() {
        let mut stats = UsageStatistics::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        for i in 0i64..60 {
            let begin = t0 + chrono::Duration::seconds(i * 5);
            let end = begin + chrono::Duration::seconds(5);
            let memory = if i < 30 { 100.0 } else { 200.0 };
            let sample = Measurement {
                cputime: 0.0,
                memory,
                diskspace: 0.0,
                traffic: 0.0,
            };
            stats.update(sample, begin, end);
        }

        let promoted = &stats.records(BucketType::FiveMinutes)[0];
        assert_eq!(promoted.measurement.memory, 150.0);
        assert_eq!(promoted.samples, 60);
        assert_eq!(stats.records(BucketType::Single).len(), 15);
    }

    #[test]
    fn five_minute_bucket_promotes_once_the_range_completes() {
        let mut stats = UsageStatistics::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        for i in 0..6 {
            let begin = t0 + chrono::Duration::minutes(i);
            let end = begin + chrono::Duration::minutes(1);
            stats.update(measurement(2.0), begin, end);
        }
        assert_eq!(stats.records(BucketType::FiveMinutes).len(), 1);
        let combined = &stats.records(BucketType::FiveMinutes)[0];
        assert_eq!(combined.measurement.cputime, 10.0);
    }
}
