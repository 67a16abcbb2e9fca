//! Core abstractions for the aggregation engine
//!
//! This module provides the error types, the problem type returned to the
//! response boundary, the capability registry and the collaborator traits.

pub mod container;
pub mod error;
pub mod problem;
pub mod traits;

// Re-export commonly used types
pub use container::ServiceContainer;
pub use error::{AggregateError, AggregateResult, ErrorContext};
pub use problem::Problem;
pub use traits::*;
