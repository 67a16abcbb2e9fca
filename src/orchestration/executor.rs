//! Aggregate execution orchestration
//!
//! This module runs the calls of an aggregate definition against one request,
//! routes them through the cache and fallbacks, and joins the payloads into
//! the response type.

use std::{any::type_name, sync::Arc, time::Instant};

use futures::{future::join_all, FutureExt};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    aggregate::{AggregateDefinition, CallDescriptor},
    core::{
        AggregateCache, AggregateError, AggregateResult, CallFuture, JsonObject, Problem,
        ServiceContainer,
    },
    metrics::{self, CallOutcome},
    statistics::StatisticsService,
};

/// Runs aggregate definitions.
///
/// The executor holds only shared collaborators; all per-execution state is
/// local to `execute`, so one instance serves any number of overlapping runs.
#[derive(Clone)]
pub struct AggregateExecutor {
    /// Capability registry for service calls and fallbacks
    services: Arc<ServiceContainer>,
    cache: Arc<dyn AggregateCache>,
    /// Records the duration of every real capability invocation, by call name
    statistics: Option<Arc<StatisticsService>>,
}

impl AggregateExecutor {
    pub fn new(services: Arc<ServiceContainer>, cache: Arc<dyn AggregateCache>) -> Self {
        Self {
            services,
            cache,
            statistics: None,
        }
    }

    pub fn with_statistics(mut self, statistics: Arc<StatisticsService>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn services(&self) -> &Arc<ServiceContainer> {
        &self.services
    }

    /// Execute `aggregate` for `request`.
    ///
    /// Every failure, whether from a call, the cache or the join, ends up as a
    /// single internal-error problem. No partial response is ever returned.
    pub async fn execute<Req, Resp>(
        &self,
        aggregate: &AggregateDefinition<Req, Resp>,
        request: Req,
        cancel: &CancellationToken,
    ) -> Result<Resp, Problem>
    where
        Req: Send + Sync + 'static,
        Resp: DeserializeOwned,
    {
        let execution_id = Uuid::new_v4();
        debug!(
            "[{execution_id}] Executing aggregate {} with {} calls ({})",
            type_name::<Resp>(),
            aggregate.len(),
            if aggregate.is_parallel() { "parallel" } else { "sequential" }
        );

        let request = Arc::new(request);
        let result = self
            .run_calls(aggregate, &request, cancel, execution_id)
            .await
            .and_then(join::<Resp>);

        metrics::record_execution(result.is_ok());
        result.map_err(|err| {
            error!("[{execution_id}] Aggregate {} failed: {err}", type_name::<Resp>());
            Problem::internal_server_error().with_detail(err.to_string())
        })
    }

    /// Bind a typed handle to the definition registered for `Req -> Resp`.
    pub fn bind<Req, Resp>(&self) -> AggregateResult<BoundAggregate<Req, Resp>>
    where
        Req: Send + Sync + 'static,
        Resp: DeserializeOwned + 'static,
    {
        let aggregate = self.services.require::<AggregateDefinition<Req, Resp>>()?;
        Ok(BoundAggregate {
            executor: self.clone(),
            aggregate,
        })
    }

    async fn run_calls<Req, Resp>(
        &self,
        aggregate: &AggregateDefinition<Req, Resp>,
        request: &Arc<Req>,
        cancel: &CancellationToken,
        execution_id: Uuid,
    ) -> AggregateResult<Vec<(String, JsonObject)>>
    where
        Req: Send + Sync + 'static,
    {
        if aggregate.is_parallel() {
            // Siblings of a failed call are not cancelled; every call runs to
            // completion and the first failure in declaration order wins.
            let results = join_all(
                aggregate
                    .calls()
                    .iter()
                    .map(|call| self.execute_call(call, request, cancel, execution_id)),
            )
            .await;
            return results.into_iter().collect();
        }

        let mut payloads = Vec::with_capacity(aggregate.len());
        for call in aggregate.calls() {
            if cancel.is_cancelled() {
                return Err(AggregateError::Cancelled);
            }
            payloads.push(self.execute_call(call, request, cancel, execution_id).await?);
        }
        Ok(payloads)
    }

    async fn execute_call<Req>(
        &self,
        call: &CallDescriptor<Req>,
        request: &Arc<Req>,
        cancel: &CancellationToken,
        execution_id: Uuid,
    ) -> AggregateResult<(String, JsonObject)>
    where
        Req: Send + Sync + 'static,
    {
        let started = Instant::now();
        debug!("[{execution_id}] Starting call {}", call.name());

        let invocation = self.invocation(call, request, cancel);
        let result = match call.cache_key(request) {
            Some(key) => {
                self.cache
                    .get_or_create(&key, call.cache_duration(), invocation, cancel)
                    .await
            }
            None => invocation.await,
        };

        let (result, outcome) = match result {
            Ok(payload) => (Ok(payload), CallOutcome::Ok),
            Err(err) if err.is_recoverable() && call.has_fallback() => {
                match call
                    .fallback(self.services.clone(), request.clone(), err.clone())
                    .await
                {
                    Some(payload) => {
                        warn!(
                            "[{execution_id}] Call {} failed, using fallback: {err}",
                            call.name()
                        );
                        (Ok(payload), CallOutcome::Fallback)
                    }
                    None => {
                        debug!("[{execution_id}] Fallback for call {} declined", call.name());
                        (
                            Err(AggregateError::FallbackDeclined(err.to_string())),
                            CallOutcome::Error,
                        )
                    }
                }
            }
            Err(err) => (Err(err), CallOutcome::Error),
        };

        let elapsed = started.elapsed();
        metrics::record_call(call.name(), outcome, elapsed);
        debug!(
            "[{execution_id}] Finished call {} ({}) in {elapsed:?}",
            call.name(),
            outcome.as_str()
        );

        result.map(|payload| (call.name().to_string(), payload))
    }

    // Deferred capability invocation. Nothing runs until the future is
    // polled, so a cache hit never touches the capability.
    fn invocation<Req>(
        &self,
        call: &CallDescriptor<Req>,
        request: &Arc<Req>,
        cancel: &CancellationToken,
    ) -> CallFuture
    where
        Req: Send + Sync + 'static,
    {
        let capability = call.capability().clone();
        let services = self.services.clone();
        let statistics = self.statistics.clone();
        let request = request.clone();
        let cancel = cancel.clone();
        let tag = call.name().to_string();

        async move {
            let invoke = capability.invoke(&services, request, cancel);
            match statistics {
                Some(statistics) => statistics.measure(tag, invoke).await,
                None => invoke.await,
            }
        }
        .boxed()
    }
}

/// Merge the per-call payloads by name and convert the result into `Resp`.
fn join<Resp>(payloads: Vec<(String, JsonObject)>) -> AggregateResult<Resp>
where
    Resp: DeserializeOwned,
{
    let joined: JsonObject = payloads
        .into_iter()
        .map(|(name, payload)| (name, Value::Object(payload)))
        .collect();

    serde_json::from_value(Value::Object(joined)).map_err(|e| {
        AggregateError::Join(format!(
            "could not create object of type {}: {e}",
            type_name::<Resp>()
        ))
    })
}

/// An executor bound to one registered aggregate definition
pub struct BoundAggregate<Req, Resp> {
    executor: AggregateExecutor,
    aggregate: Arc<AggregateDefinition<Req, Resp>>,
}

impl<Req, Resp> Clone for BoundAggregate<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            aggregate: self.aggregate.clone(),
        }
    }
}

impl<Req, Resp> BoundAggregate<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: DeserializeOwned,
{
    pub fn definition(&self) -> &AggregateDefinition<Req, Resp> {
        &self.aggregate
    }

    pub async fn execute(&self, request: Req, cancel: &CancellationToken) -> Result<Resp, Problem> {
        self.executor.execute(&self.aggregate, request, cancel).await
    }
}
