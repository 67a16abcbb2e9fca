use std::fs;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{config_error, core::AggregateResult};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub log: Option<Log>,

    #[validate(nested)]
    #[serde(default)]
    pub cache: CacheConfig,

    #[validate(nested)]
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> AggregateResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {}: {}", path, e))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> AggregateResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| config_error!("Unable to parse yaml conf: {}", e))?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> AggregateResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(length(min = 1))]
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Seconds an entry lives when its call sets no cache duration
    #[serde(default = "CacheConfig::default_ttl")]
    #[validate(range(min = 1))]
    pub default_ttl: u64,
}

impl CacheConfig {
    fn default_ttl() -> u64 {
        300
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Self::default_ttl(),
        }
    }
}

/// One year, in seconds
const MAX_STATISTICS_PERIOD: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct StatisticsConfig {
    /// Seconds between anomaly reports
    #[serde(default = "StatisticsConfig::default_report_interval")]
    #[validate(range(min = 1, max = MAX_STATISTICS_PERIOD))]
    pub report_interval: u64,

    /// Seconds of history treated as "recent" when looking for anomalies
    #[serde(default = "StatisticsConfig::default_recent_window")]
    #[validate(range(min = 1, max = MAX_STATISTICS_PERIOD))]
    pub recent_window: u64,

    #[serde(default = "StatisticsConfig::default_anomaly_factor")]
    #[validate(range(min = 1.0))]
    pub anomaly_factor: f64,

    #[serde(default = "StatisticsConfig::default_buckets")]
    #[validate(nested)]
    pub buckets: Vec<BucketConfig>,
}

impl StatisticsConfig {
    fn default_report_interval() -> u64 {
        15 * 60
    }

    fn default_recent_window() -> u64 {
        5 * 60
    }

    fn default_anomaly_factor() -> f64 {
        1.5
    }

    fn default_buckets() -> Vec<BucketConfig> {
        vec![
            BucketConfig {
                name: "fast".to_string(),
                min_time: 0,
                max_time: Some(100),
            },
            BucketConfig {
                name: "average".to_string(),
                min_time: 100,
                max_time: Some(200),
            },
            BucketConfig {
                name: "slow".to_string(),
                min_time: 200,
                max_time: None,
            },
        ]
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            report_interval: Self::default_report_interval(),
            recent_window: Self::default_recent_window(),
            anomaly_factor: Self::default_anomaly_factor(),
            buckets: Self::default_buckets(),
        }
    }
}

/// Bucket bounds in milliseconds; `max_time` is exclusive, absent means unbounded.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "BucketConfig::validate_range"))]
pub struct BucketConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub min_time: u64,
    pub max_time: Option<u64>,
}

impl BucketConfig {
    fn validate_range(&self) -> Result<(), ValidationError> {
        match self.max_time {
            Some(max) if max <= self.min_time => Err(ValidationError::new("bucket_max_time_not_above_min_time")),
            _ => Ok(()),
        }
    }
}
