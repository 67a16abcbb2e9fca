//! Aggregate definitions
//!
//! An aggregate is a declared set of named calls whose JSON payloads are
//! joined, by name, into a single typed response. The builder assembles one
//! at startup; the orchestration module runs it per request.

pub mod builder;
pub mod call;
pub mod definition;

pub use builder::AggregateBuilder;
pub use call::{CallDescriptor, CallOptions, Capability};
pub use definition::AggregateDefinition;
