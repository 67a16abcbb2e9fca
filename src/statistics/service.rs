//! Per-tag duration recording
//!
//! Measurements are appended from any number of tasks at once. Each tag lives
//! in its own map entry so unrelated tags never contend on the same lock.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::trace;

use super::{
    clock::MonotonicClock,
    model::{Measurement, Performance, StatisticsOptions},
};
use crate::core::TimeSource;

const UNKNOWN_BUCKET: &str = "unknown";

pub struct StatisticsService {
    clock: Arc<dyn TimeSource>,
    options: StatisticsOptions,
    statistics: DashMap<String, Vec<Measurement>>,
}

impl Default for StatisticsService {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock), StatisticsOptions::default())
    }
}

impl StatisticsService {
    pub fn new(clock: Arc<dyn TimeSource>, options: StatisticsOptions) -> Self {
        Self {
            clock,
            options,
            statistics: DashMap::new(),
        }
    }

    pub fn options(&self) -> &StatisticsOptions {
        &self.options
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Start timing `tag`. The returned guard records on drop unless cancelled.
    pub fn start_measuring(&self, tag: impl Into<String>) -> Measurer<'_> {
        let tag = tag.into();
        self.statistics.entry(tag.clone()).or_default();
        Measurer {
            start: self.clock.now(),
            tag,
            service: self,
            finalized: false,
            record_on_drop: true,
        }
    }

    pub fn add(&self, tag: &str, start: Instant, end: Instant) {
        trace!("Recording measurement for {tag}");
        self.statistics
            .entry(tag.to_string())
            .or_default()
            .push(Measurement::new(start, end));
    }

    /// Time a fallible future under `tag`. Only runs that complete with `Ok`
    /// are recorded; failures and futures dropped mid-flight are not.
    pub async fn measure<F, T, E>(&self, tag: impl Into<String>, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let mut measurer = self.start_measuring(tag);
        measurer.record_on_drop = false;
        let result = fut.await;
        if result.is_ok() {
            measurer.stop();
        }
        result
    }

    /// Point-in-time copy of every tag and its measurements, ordered by tag.
    pub fn statistics(&self) -> Vec<(String, Vec<Measurement>)> {
        let mut snapshot: Vec<_> = self
            .statistics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Mean duration per tag, optionally over measurements started at or
    /// after `after`. Tags with nothing in range are left out.
    pub fn calculate_performances(&self, after: Option<Instant>) -> Vec<Performance> {
        self.statistics()
            .into_iter()
            .filter_map(|(tag, measurements)| {
                let durations: Vec<Duration> = measurements
                    .iter()
                    .filter(|m| after.map_or(true, |after| m.start >= after))
                    .map(Measurement::duration)
                    .collect();
                let average_time = average(&durations)?;
                let bucket = self
                    .options
                    .bucket_for(average_time)
                    .map_or(UNKNOWN_BUCKET, |b| b.name.as_str())
                    .to_string();

                Some(Performance {
                    tag,
                    average_time,
                    bucket,
                })
            })
            .collect()
    }
}

fn average(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    let total: u128 = durations.iter().map(Duration::as_nanos).sum();
    let mean = total / durations.len() as u128;
    Some(Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX)))
}

/// Tag used for outbound calls: the host of the target URL.
pub fn tag_for_url(url: &str) -> Option<String> {
    let uri: http::Uri = url.parse().ok()?;
    uri.host().map(str::to_string)
}

/// Guard for one running measurement.
///
/// Only the first of `stop`, `cancel` or drop has any effect.
pub struct Measurer<'a> {
    tag: String,
    service: &'a StatisticsService,
    start: Instant,
    finalized: bool,
    record_on_drop: bool,
}

impl Measurer<'_> {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn stop(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.service
            .add(&self.tag, self.start, self.service.clock.now());
    }

    pub fn cancel(&mut self) {
        self.finalized = true;
    }
}

impl Drop for Measurer<'_> {
    fn drop(&mut self) {
        if self.record_on_drop {
            self.stop();
        }
    }
}
