//! Call descriptors: one named sub-call of an aggregate

use std::{
    any::{type_name, Any},
    fmt,
    future::Future,
    sync::Arc,
    time::Duration,
};

use futures::future::{self, BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::core::{AggregateError, AggregateResult, CallFuture, JsonObject, ServiceContainer};

type FunctionFn<Req> = dyn Fn(&Req) -> AggregateResult<JsonObject> + Send + Sync;
type ServiceFn<Req> =
    dyn Fn(&ServiceContainer, Arc<Req>, CancellationToken) -> AggregateResult<CallFuture> + Send + Sync;
type CacheKeyFn<Req> = dyn Fn(&Req) -> Option<String> + Send + Sync;
type FallbackFn<Req> = dyn Fn(Arc<ServiceContainer>, Arc<Req>, AggregateError) -> BoxFuture<'static, Option<JsonObject>>
    + Send
    + Sync;

/// The unit of work behind a call
pub enum Capability<Req> {
    /// Synchronous transform of the request, never suspends
    Function(Arc<FunctionFn<Req>>),
    /// Asynchronous call against a service resolved from the container
    Service {
        service: &'static str,
        call: Arc<ServiceFn<Req>>,
    },
}

impl<Req> Clone for Capability<Req> {
    fn clone(&self) -> Self {
        match self {
            Capability::Function(call) => Capability::Function(call.clone()),
            Capability::Service { service, call } => Capability::Service {
                service: *service,
                call: call.clone(),
            },
        }
    }
}

impl<Req> fmt::Debug for Capability<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Function(_) => f.write_str("Function"),
            Capability::Service { service, .. } => write!(f, "Service({service})"),
        }
    }
}

impl<Req> Capability<Req>
where
    Req: Send + Sync + 'static,
{
    pub fn function<F>(call: F) -> Self
    where
        F: Fn(&Req) -> AggregateResult<JsonObject> + Send + Sync + 'static,
    {
        Capability::Function(Arc::new(call))
    }

    pub fn service<S, F, Fut>(call: F) -> Self
    where
        S: Any + Send + Sync,
        F: Fn(Arc<S>, Arc<Req>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AggregateResult<JsonObject>> + Send + 'static,
    {
        Capability::Service {
            service: type_name::<S>(),
            call: Arc::new(
                move |services: &ServiceContainer,
                      request: Arc<Req>,
                      cancel: CancellationToken|
                      -> AggregateResult<CallFuture> {
                    let service = services.require::<S>()?;
                    Ok(call(service, request, cancel).boxed())
                },
            ),
        }
    }

    /// Start the call. Function capabilities run to completion here; a
    /// service that cannot be resolved yields a non-recoverable error.
    pub fn invoke(
        &self,
        services: &ServiceContainer,
        request: Arc<Req>,
        cancel: CancellationToken,
    ) -> CallFuture {
        match self {
            Capability::Function(call) => future::ready(call(request.as_ref())).boxed(),
            Capability::Service { call, .. } => match call(services, request, cancel) {
                Ok(fut) => fut,
                Err(err) => future::ready(Err(err)).boxed(),
            },
        }
    }
}

/// Optional per-call cache and fallback settings
pub struct CallOptions<Req> {
    cache_key: Option<Arc<CacheKeyFn<Req>>>,
    cache_duration: Option<Duration>,
    fallback: Option<Arc<FallbackFn<Req>>>,
}

impl<Req> Default for CallOptions<Req> {
    fn default() -> Self {
        Self {
            cache_key: None,
            cache_duration: None,
            fallback: None,
        }
    }
}

impl<Req> CallOptions<Req>
where
    Req: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the cache key from the request; `None` or an empty key skips the cache.
    pub fn cache<F>(mut self, key: F) -> Self
    where
        F: Fn(&Req) -> Option<String> + Send + Sync + 'static,
    {
        self.cache_key = Some(Arc::new(key));
        self
    }

    pub fn cache_duration(mut self, ttl: Duration) -> Self {
        self.cache_duration = Some(ttl);
        self
    }

    /// Substitute a payload when the capability fails. Returning `None`
    /// re-raises the original failure.
    pub fn fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(Arc<ServiceContainer>, Arc<Req>, AggregateError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<JsonObject>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(
            move |services: Arc<ServiceContainer>, request: Arc<Req>, err: AggregateError| {
                fallback(services, request, err).boxed()
            },
        ));
        self
    }
}

/// Configuration of one named call. Immutable once built.
pub struct CallDescriptor<Req> {
    name: String,
    capability: Capability<Req>,
    cache_key: Option<Arc<CacheKeyFn<Req>>>,
    cache_duration: Option<Duration>,
    fallback: Option<Arc<FallbackFn<Req>>>,
}

impl<Req> Clone for CallDescriptor<Req> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            capability: self.capability.clone(),
            cache_key: self.cache_key.clone(),
            cache_duration: self.cache_duration,
            fallback: self.fallback.clone(),
        }
    }
}

impl<Req> fmt::Debug for CallDescriptor<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallDescriptor")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("cached", &self.cache_key.is_some())
            .field("cache_duration", &self.cache_duration)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<Req> CallDescriptor<Req>
where
    Req: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, capability: Capability<Req>, options: CallOptions<Req>) -> Self {
        Self {
            name: name.into(),
            capability,
            cache_key: options.cache_key,
            cache_duration: options.cache_duration,
            fallback: options.fallback,
        }
    }

    pub fn function<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&Req) -> AggregateResult<JsonObject> + Send + Sync + 'static,
    {
        Self::new(name, Capability::function(call), CallOptions::default())
    }

    pub fn service<S, F, Fut>(name: impl Into<String>, call: F) -> Self
    where
        S: Any + Send + Sync,
        F: Fn(Arc<S>, Arc<Req>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AggregateResult<JsonObject>> + Send + 'static,
    {
        Self::new(name, Capability::service(call), CallOptions::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &Capability<Req> {
        &self.capability
    }

    pub fn cache_duration(&self) -> Option<Duration> {
        self.cache_duration
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Cache key for this request; empty keys count as no key.
    pub fn cache_key(&self, request: &Req) -> Option<String> {
        self.cache_key
            .as_ref()
            .and_then(|key| key(request))
            .filter(|key| !key.is_empty())
    }

    /// Run the fallback, if any, for a failed invocation.
    pub async fn fallback(
        &self,
        services: Arc<ServiceContainer>,
        request: Arc<Req>,
        err: AggregateError,
    ) -> Option<JsonObject> {
        match &self.fallback {
            Some(fallback) => fallback(services, request, err).await,
            None => None,
        }
    }
}
