use std::sync::Arc;

use log::{debug, info};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant as TokioInstant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{model::Performance, service::StatisticsService};

/// A tag whose recent average has drifted well above its all-time average
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub tag: String,
    pub recent: Performance,
    pub all_time: Performance,
}

/// Periodically compares recent and all-time performance and logs the outliers.
pub struct StatisticsReporter {
    statistics: Arc<StatisticsService>,
}

impl StatisticsReporter {
    pub fn new(statistics: Arc<StatisticsService>) -> Self {
        Self { statistics }
    }

    pub fn detect_anomalies(&self) -> Vec<Anomaly> {
        let options = self.statistics.options();
        let all_time = self.statistics.calculate_performances(None);

        let Some(since) = self.statistics.now().checked_sub(options.recent_window) else {
            // Process younger than the window: everything is recent.
            return Vec::new();
        };
        let recent = self.statistics.calculate_performances(Some(since));

        recent
            .into_iter()
            .filter_map(|recent| {
                let all_time = all_time.iter().find(|p| p.tag == recent.tag)?.clone();
                let threshold = all_time.average_time.as_secs_f64() * options.anomaly_factor;
                (recent.average_time.as_secs_f64() > threshold).then(|| Anomaly {
                    tag: recent.tag.clone(),
                    recent,
                    all_time,
                })
            })
            .collect()
    }

    pub fn report(&self) -> Vec<Anomaly> {
        let anomalies = self.detect_anomalies();
        for anomaly in &anomalies {
            info!(
                "Performance anomaly for {}: recent {:?} ({}) vs all-time {:?} ({})",
                anomaly.tag,
                anomaly.recent.average_time,
                anomaly.recent.bucket,
                anomaly.all_time.average_time,
                anomaly.all_time.bucket,
            );
        }
        debug!("Statistics report done, {} anomalies", anomalies.len());
        anomalies
    }

    /// Report every `report_interval` until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.statistics.options().report_interval;
        tokio::spawn(async move {
            let Some(first_tick) = TokioInstant::now().checked_add(period) else {
                info!("Statistics report interval {period:?} is out of range, reporter idle");
                shutdown.cancelled().await;
                return;
            };
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Statistics reporter stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.report();
                    }
                }
            }
        })
    }
}
