//! Fluent construction of aggregate definitions
//!
//! The builder only assembles data. Nothing is validated here: a missing
//! service surfaces when a call runs, and duplicate names are only reported.

use std::{any::Any, collections::HashSet, future::Future, marker::PhantomData, sync::Arc};

use log::warn;
use tokio_util::sync::CancellationToken;

use super::{
    call::{CallDescriptor, CallOptions, Capability},
    definition::AggregateDefinition,
};
use crate::core::{AggregateResult, JsonObject};

pub struct AggregateBuilder<Req, Resp> {
    calls: Vec<CallDescriptor<Req>>,
    parallel: bool,
    _response: PhantomData<fn() -> Resp>,
}

impl<Req, Resp> Default for AggregateBuilder<Req, Resp> {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            parallel: false,
            _response: PhantomData,
        }
    }
}

impl<Req, Resp> AggregateBuilder<Req, Resp>
where
    Req: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synchronous call computed from the request alone.
    pub fn add_function_call<F>(self, name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&Req) -> AggregateResult<JsonObject> + Send + Sync + 'static,
    {
        self.add_function_call_with(name, call, CallOptions::default())
    }

    pub fn add_function_call_with<F>(
        self,
        name: impl Into<String>,
        call: F,
        options: CallOptions<Req>,
    ) -> Self
    where
        F: Fn(&Req) -> AggregateResult<JsonObject> + Send + Sync + 'static,
    {
        self.add_call(CallDescriptor::new(name, Capability::function(call), options))
    }

    /// Add an asynchronous call against the service registered for `S`.
    pub fn add_service_call<S, F, Fut>(self, name: impl Into<String>, call: F) -> Self
    where
        S: Any + Send + Sync,
        F: Fn(Arc<S>, Arc<Req>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AggregateResult<JsonObject>> + Send + 'static,
    {
        self.add_service_call_with(name, call, CallOptions::default())
    }

    pub fn add_service_call_with<S, F, Fut>(
        self,
        name: impl Into<String>,
        call: F,
        options: CallOptions<Req>,
    ) -> Self
    where
        S: Any + Send + Sync,
        F: Fn(Arc<S>, Arc<Req>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AggregateResult<JsonObject>> + Send + 'static,
    {
        self.add_call(CallDescriptor::new(name, Capability::service(call), options))
    }

    pub fn add_call(mut self, call: CallDescriptor<Req>) -> Self {
        self.calls.push(call);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn execute_in_parallel(self) -> Self {
        self.parallel(true)
    }

    /// Snapshot the calls added so far into an immutable definition.
    pub fn build(&self) -> AggregateDefinition<Req, Resp> {
        let mut seen = HashSet::new();
        for call in &self.calls {
            if !seen.insert(call.name()) {
                warn!(
                    "Aggregate call name '{}' is declared more than once, the last declaration wins the join",
                    call.name()
                );
            }
        }

        AggregateDefinition::new(self.calls.clone(), self.parallel)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Clock;

    fn empty(_: &String) -> AggregateResult<JsonObject> {
        Ok(JsonObject::new())
    }

    #[test]
    fn test_build_preserves_order_and_mode() {
        let aggregate: AggregateDefinition<String, JsonObject> = AggregateBuilder::new()
            .add_function_call("1", empty)
            .add_service_call("2", |_: Arc<Clock>, _: Arc<String>, _| async { Ok(JsonObject::new()) })
            .add_function_call("3", empty)
            .execute_in_parallel()
            .build();

        let names: Vec<_> = aggregate.calls().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["1", "2", "3"]);
        assert!(aggregate.is_parallel());
        assert!(matches!(
            aggregate.calls()[1].capability(),
            Capability::Service { .. }
        ));
    }

    #[test]
    fn test_build_is_a_snapshot() {
        let builder = AggregateBuilder::<String, JsonObject>::new().add_function_call("1", empty);
        let first = builder.build();

        let builder = builder.add_function_call("2", empty);
        let second = builder.build();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert!(!second.is_parallel());
    }

    #[test]
    fn test_call_options() {
        let aggregate: AggregateDefinition<String, JsonObject> = AggregateBuilder::new()
            .add_function_call_with(
                "cached",
                empty,
                CallOptions::new()
                    .cache(|r: &String| Some(format!("key::{r}")))
                    .cache_duration(Duration::from_secs(7200))
                    .fallback(|_, _, _| async { None }),
            )
            .build();

        let call = &aggregate.calls()[0];
        assert_eq!(call.cache_key(&"a".to_string()).as_deref(), Some("key::a"));
        assert_eq!(call.cache_duration(), Some(Duration::from_secs(7200)));
        assert!(call.has_fallback());
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let aggregate: AggregateDefinition<String, JsonObject> = AggregateBuilder::new()
            .add_function_call("same", empty)
            .add_function_call("same", empty)
            .build();

        assert_eq!(aggregate.len(), 2);
    }
}
