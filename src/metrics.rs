//! Validation metrics: running totals plus hourly and daily time series.
//!
//! The recorder is append-only and mutex-guarded; every verification emits
//! exactly one sample on exit, successful or not.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 86_400_000;
const HOURLY_RETENTION: usize = 24;
const DAILY_RETENTION: usize = 30;

#[derive(Debug, Default)]
struct Bucket {
    timestamp: u64,
    validations: u64,
    successes: u64,
    duration_ms_sum: u64,
}

#[derive(Debug, Default)]
struct Inner {
    total: u64,
    successful: u64,
    failed: u64,
    duration_ms_sum: u64,
    hourly: VecDeque<Bucket>,
    daily: VecDeque<Bucket>,
}

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<Inner>,
}

/// One point of the hourly/daily series; `timestamp` is bucket-aligned
/// milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub timestamp: u64,
    pub validations: u64,
    /// Percentage of successful validations in the bucket, rounded to two
    /// decimals.
    pub success_rate: f64,
    /// Mean validation duration in the bucket, in rounded milliseconds.
    pub average_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_validations: u64,
    pub successful_validations: u64,
    pub failed_validations: u64,
    /// Mean duration across all validations, in rounded milliseconds.
    pub average_validation_time: u64,
    pub hourly_metrics: Vec<SeriesPoint>,
    pub daily_metrics: Vec<SeriesPoint>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished validation that started at `started_at`.
    pub fn record(&self, started_at: SystemTime, success: bool) {
        let now_ms = epoch_ms(SystemTime::now());
        let started_ms = epoch_ms(started_at);
        let duration_ms = now_ms.saturating_sub(started_ms);
        self.record_sample(now_ms, duration_ms, success);
    }

    pub(crate) fn record_sample(&self, now_ms: u64, duration_ms: u64, success: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total += 1;
        if success {
            inner.successful += 1;
        } else {
            inner.failed += 1;
        }
        inner.duration_ms_sum += duration_ms;

        bucket_sample(
            &mut inner.hourly,
            now_ms - now_ms % HOUR_MS,
            HOURLY_RETENTION,
            duration_ms,
            success,
        );
        bucket_sample(
            &mut inner.daily,
            now_ms - now_ms % DAY_MS,
            DAILY_RETENTION,
            duration_ms,
            success,
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            total_validations: inner.total,
            successful_validations: inner.successful,
            failed_validations: inner.failed,
            average_validation_time: rounded_mean(inner.duration_ms_sum, inner.total),
            hourly_metrics: inner.hourly.iter().map(series_point).collect(),
            daily_metrics: inner.daily.iter().map(series_point).collect(),
        }
    }
}

fn bucket_sample(
    series: &mut VecDeque<Bucket>,
    aligned: u64,
    retention: usize,
    duration_ms: u64,
    success: bool,
) {
    let needs_new = series.back().is_none_or(|bucket| bucket.timestamp != aligned);
    if needs_new {
        series.push_back(Bucket {
            timestamp: aligned,
            ..Bucket::default()
        });
        while series.len() > retention {
            series.pop_front();
        }
    }
    if let Some(bucket) = series.back_mut() {
        bucket.validations += 1;
        if success {
            bucket.successes += 1;
        }
        bucket.duration_ms_sum += duration_ms;
    }
}

fn series_point(bucket: &Bucket) -> SeriesPoint {
    let success_rate = if bucket.validations == 0 {
        0.0
    } else {
        let percent = bucket.successes as f64 * 100.0 / bucket.validations as f64;
        (percent * 100.0).round() / 100.0
    };
    SeriesPoint {
        timestamp: bucket.timestamp,
        validations: bucket.validations,
        success_rate,
        average_time: rounded_mean(bucket.duration_ms_sum, bucket.validations),
    }
}

fn rounded_mean(sum: u64, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        (sum + count / 2) / count
    }
}

fn epoch_ms(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_and_average() {
        let metrics = MetricsRecorder::new();
        metrics.record_sample(HOUR_MS, 100, true);
        metrics.record_sample(HOUR_MS + 1, 200, false);
        metrics.record_sample(HOUR_MS + 2, 301, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_validations, 3);
        assert_eq!(snapshot.successful_validations, 2);
        assert_eq!(snapshot.failed_validations, 1);
        assert_eq!(snapshot.average_validation_time, 200);
    }

    #[test]
    fn samples_in_same_hour_share_a_bucket() {
        let metrics = MetricsRecorder::new();
        metrics.record_sample(HOUR_MS + 10, 50, true);
        metrics.record_sample(HOUR_MS + 500_000, 150, false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hourly_metrics.len(), 1);
        let point = &snapshot.hourly_metrics[0];
        assert_eq!(point.timestamp, HOUR_MS);
        assert_eq!(point.validations, 2);
        assert_eq!(point.success_rate, 50.0);
        assert_eq!(point.average_time, 100);
    }

    #[test]
    fn hourly_retention_is_24_buckets() {
        let metrics = MetricsRecorder::new();
        for hour in 0..30u64 {
            metrics.record_sample(hour * HOUR_MS, 10, true);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hourly_metrics.len(), 24);
        assert_eq!(snapshot.hourly_metrics[0].timestamp, 6 * HOUR_MS);
        // 30 hours span two daily buckets.
        assert_eq!(snapshot.daily_metrics.len(), 2);
    }

    #[test]
    fn daily_retention_is_30_buckets() {
        let metrics = MetricsRecorder::new();
        for day in 0..35u64 {
            metrics.record_sample(day * DAY_MS, 10, true);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.daily_metrics.len(), 30);
        assert_eq!(snapshot.daily_metrics[0].timestamp, 5 * DAY_MS);
    }

    #[test]
    fn snapshot_wire_names() {
        let metrics = MetricsRecorder::new();
        metrics.record_sample(HOUR_MS, 10, true);
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["totalValidations"], 1);
        assert_eq!(json["successfulValidations"], 1);
        assert_eq!(json["failedValidations"], 0);
        assert_eq!(json["averageValidationTime"], 10);
        assert_eq!(json["hourlyMetrics"][0]["successRate"], 100.0);
        assert_eq!(json["hourlyMetrics"][0]["averageTime"], 10);
    }

    #[test]
    fn record_uses_wall_clock() {
        let metrics = MetricsRecorder::new();
        metrics.record(SystemTime::now(), true);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_validations, 1);
        assert_eq!(snapshot.hourly_metrics.len(), 1);
    }
}
