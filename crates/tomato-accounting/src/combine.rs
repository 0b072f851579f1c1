use chrono::{DateTime, Utc};
use tomato_core::ids::StatisticsId;
use tomato_core::measurement::Measurement;

use crate::bucket::BucketType;
use crate::record::UsageRecord;

/// Folds `sources` — completed, time-adjacent records of the next-finer
/// bucket type — into one record at `bucket_type`.
///
/// `cputime` and `traffic` are cumulative counters, so their contributions
/// simply sum. `memory` and `diskspace` are instantaneous readings, so they
/// are combined as a measurement-weighted mean: `Σ(r.metric · r.samples) /
/// Σ r.samples`, matching the `combine()` arithmetic in the original
/// accounting module exactly (not a duration-weighted mean — a source
/// record's `samples` count is the unit of weight, not its wall-clock
/// span). If the total sample count is zero the combined record is
/// zero-valued rather than dividing by zero.
pub fn combine(
    statistics_id: StatisticsId,
    bucket_type: BucketType,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    sources: &[UsageRecord],
) -> UsageRecord {
    let mut cputime = 0.0;
    let mut traffic = 0.0;
    let mut memory_weighted = 0.0;
    let mut diskspace_weighted = 0.0;
    let mut samples = 0u32;

    for record in sources {
        cputime += record.measurement.cputime;
        traffic += record.measurement.traffic;
        let weight = record.samples as f64;
        memory_weighted += record.measurement.memory * weight;
        diskspace_weighted += record.measurement.diskspace * weight;
        samples += record.samples;
    }

    let (memory, diskspace) = if samples > 0 {
        (memory_weighted / samples as f64, diskspace_weighted / samples as f64)
    } else {
        (0.0, 0.0)
    };

    let measurement = Measurement {
        cputime,
        memory,
        diskspace,
        traffic,
    };

    UsageRecord::new(statistics_id, bucket_type, begin, end, measurement, samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(begin: DateTime<Utc>, end: DateTime<Utc>, m: Measurement) -> UsageRecord {
        UsageRecord::new(StatisticsId::new(), BucketType::Single, begin, end, m, 1)
    }

    #[test]
    fn cumulative_metrics_sum_and_instantaneous_metrics_average() {
        let t0 = chrono::Utc::now();
        let a = record(
            t0,
            t0 + chrono::Duration::minutes(5),
            Measurement {
                cputime: 10.0,
                memory: 100.0,
                diskspace: 200.0,
                traffic: 1000.0,
            },
        );
        let b = record(
            t0 + chrono::Duration::minutes(5),
            t0 + chrono::Duration::minutes(10),
            Measurement {
                cputime: 20.0,
                memory: 300.0,
                diskspace: 400.0,
                traffic: 2000.0,
            },
        );
        let combined = combine(
            StatisticsId::new(),
            BucketType::FiveMinutes,
            t0,
            t0 + chrono::Duration::minutes(10),
            &[a, b],
        );
        assert_eq!(combined.measurement.cputime, 30.0);
        assert_eq!(combined.measurement.traffic, 3000.0);
        assert_eq!(combined.measurement.memory, 200.0);
        assert_eq!(combined.measurement.diskspace, 300.0);
        assert_eq!(combined.samples, 2);
    }
}
