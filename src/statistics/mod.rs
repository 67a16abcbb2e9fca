//! Call duration statistics
//!
//! Durations are recorded per tag (usually the upstream host), averaged on
//! demand and classified into configurable buckets. A background reporter
//! logs tags whose recent average is far above their all-time average.

pub mod clock;
pub mod model;
pub mod reporter;
pub mod service;

pub use clock::{ManualClock, MonotonicClock};
pub use model::{Measurement, Performance, PerformanceBucket, StatisticsOptions};
pub use reporter::{Anomaly, StatisticsReporter};
pub use service::{tag_for_url, Measurer, StatisticsService};
