//! Aggregate orchestration layer
//!
//! This module runs built aggregate definitions: per-call caching and
//! fallbacks, parallel or sequential scheduling, and the final join.

pub mod executor;


pub use executor::{AggregateExecutor, BoundAggregate};
