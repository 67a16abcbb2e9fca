use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::config::{BucketConfig, StatisticsConfig};

/// One recorded start/end pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub start: Instant,
    pub end: Instant,
}

impl Measurement {
    pub fn new(start: Instant, end: Instant) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Average duration of one tag and the bucket it falls into
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub tag: String,
    #[serde(rename = "average_time_ms", serialize_with = "serialize_millis")]
    pub average_time: Duration,
    pub bucket: String,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
}

/// A named duration range used to classify averages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceBucket {
    pub name: String,
    /// Inclusive lower bound.
    pub min_time: Duration,
    /// Exclusive upper bound, `None` for unbounded.
    pub max_time: Option<Duration>,
}

impl PerformanceBucket {
    pub fn new(name: impl Into<String>, min_time: Duration, max_time: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            min_time,
            max_time,
        }
    }

    pub fn is_in_bucket(&self, time: Duration) -> bool {
        time >= self.min_time && self.max_time.map_or(true, |max| time < max)
    }
}

impl From<&BucketConfig> for PerformanceBucket {
    fn from(config: &BucketConfig) -> Self {
        Self::new(
            config.name.clone(),
            Duration::from_millis(config.min_time),
            config.max_time.map(Duration::from_millis),
        )
    }
}

#[derive(Debug, Clone)]
pub struct StatisticsOptions {
    pub report_interval: Duration,
    pub recent_window: Duration,
    pub anomaly_factor: f64,
    pub buckets: Vec<PerformanceBucket>,
}

impl StatisticsOptions {
    /// First bucket, in configured order, containing `time`.
    pub fn bucket_for(&self, time: Duration) -> Option<&PerformanceBucket> {
        self.buckets.iter().find(|bucket| bucket.is_in_bucket(time))
    }
}

impl From<&StatisticsConfig> for StatisticsOptions {
    fn from(config: &StatisticsConfig) -> Self {
        Self {
            report_interval: Duration::from_secs(config.report_interval),
            recent_window: Duration::from_secs(config.recent_window),
            anomaly_factor: config.anomaly_factor,
            buckets: config.buckets.iter().map(PerformanceBucket::from).collect(),
        }
    }
}

impl Default for StatisticsOptions {
    fn default() -> Self {
        Self::from(&StatisticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_name(time_ms: u64) -> Option<String> {
        StatisticsOptions::default()
            .bucket_for(Duration::from_millis(time_ms))
            .map(|b| b.name.clone())
    }

    #[test]
    fn test_default_buckets() {
        for (expected, times) in [
            ("fast", [0, 50, 99]),
            ("average", [100, 150, 199]),
            ("slow", [200, 250, 301]),
        ] {
            for time in times {
                assert_eq!(bucket_name(time).as_deref(), Some(expected), "{time}ms");
            }
        }
        assert_eq!(bucket_name(299).as_deref(), Some("slow"));
    }

    #[test]
    fn test_bucket_bounds() {
        let bucket = PerformanceBucket::new(
            "mid",
            Duration::from_millis(50),
            Some(Duration::from_millis(100)),
        );
        assert!(!bucket.is_in_bucket(Duration::from_millis(49)));
        assert!(bucket.is_in_bucket(Duration::from_millis(50)));
        assert!(!bucket.is_in_bucket(Duration::from_millis(100)));
    }

    #[test]
    fn test_no_matching_bucket() {
        let options = StatisticsOptions {
            buckets: vec![PerformanceBucket::new(
                "only",
                Duration::from_millis(10),
                Some(Duration::from_millis(20)),
            )],
            ..StatisticsOptions::default()
        };
        assert!(options.bucket_for(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_measurement_duration() {
        let start = Instant::now();
        let m = Measurement::new(start, start + Duration::from_millis(50));
        assert_eq!(m.duration(), Duration::from_millis(50));

        let backwards = Measurement::new(m.end, m.start);
        assert_eq!(backwards.duration(), Duration::ZERO);
    }

    #[test]
    fn test_performance_serialization() {
        let perf = Performance {
            tag: "api.example.com".to_string(),
            average_time: Duration::from_millis(150),
            bucket: "average".to_string(),
        };
        let json = serde_json::to_value(&perf).unwrap();
        assert_eq!(json["average_time_ms"], serde_json::json!(150.0));
        assert_eq!(json["bucket"], "average");
    }
}
