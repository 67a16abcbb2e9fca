//! Request aggregation engine.
//!
//! An aggregate fans one request out to a set of named calls, each a plain
//! function or a call against a registered service, and joins their JSON
//! payloads into one typed response. Calls may be cached and may carry a
//! fallback. Call durations feed a small statistics subsystem.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod statistics;
pub mod utils;

pub use aggregate::{AggregateBuilder, AggregateDefinition, CallDescriptor, CallOptions};
pub use cache::MemoryCache;
pub use core::{AggregateError, AggregateResult, JsonObject, Problem, ServiceContainer};
pub use orchestration::{AggregateExecutor, BoundAggregate};
