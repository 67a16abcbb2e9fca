//! Capability registry
//!
//! Service calls resolve their backing service from this container by type.
//! It is populated once at startup and shared read-only afterwards.

use std::{
    any::{type_name, Any, TypeId},
    sync::Arc,
};

use dashmap::DashMap;
use log::debug;

use super::error::{AggregateError, AggregateResult};
use crate::aggregate::AggregateDefinition;

/// Type-keyed registry of shared services
#[derive(Default)]
pub struct ServiceContainer {
    services: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the service registered for `S`
    pub fn register<S>(&self, service: Arc<S>)
    where
        S: Any + Send + Sync,
    {
        debug!("Registering service {}", type_name::<S>());
        self.services.insert(TypeId::of::<S>(), service);
    }

    /// Get the service registered for `S`, if any
    pub fn resolve<S>(&self) -> Option<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        self.services
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.value().clone().downcast::<S>().ok())
    }

    /// Get the service registered for `S` or fail with a configuration error
    pub fn require<S>(&self) -> AggregateResult<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        self.resolve::<S>()
            .ok_or(AggregateError::ServiceNotRegistered {
                service: type_name::<S>(),
            })
    }

    pub fn contains<S>(&self) -> bool
    where
        S: Any + Send + Sync,
    {
        self.services.contains_key(&TypeId::of::<S>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Register a built aggregate so a typed executor can be bound to it later
    pub fn register_aggregate<Req, Resp>(&self, aggregate: AggregateDefinition<Req, Resp>)
    where
        Req: Send + Sync + 'static,
        Resp: 'static,
    {
        self.register(Arc::new(aggregate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WeatherClient {
        city: &'static str,
    }

    struct NewsClient;

    #[test]
    fn test_register_and_resolve() {
        let container = ServiceContainer::new();
        assert!(container.is_empty());
        assert!(container.resolve::<WeatherClient>().is_none());

        container.register(Arc::new(WeatherClient { city: "Athens" }));

        let client = container.resolve::<WeatherClient>().unwrap();
        assert_eq!(client.city, "Athens");
        assert!(container.contains::<WeatherClient>());
        assert!(!container.contains::<NewsClient>());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_register_replaces() {
        let container = ServiceContainer::new();
        container.register(Arc::new(WeatherClient { city: "Athens" }));
        container.register(Arc::new(WeatherClient { city: "Oslo" }));

        assert_eq!(container.len(), 1);
        assert_eq!(container.require::<WeatherClient>().unwrap().city, "Oslo");
    }

    #[test]
    fn test_require_missing_service() {
        let container = ServiceContainer::new();
        let err = container.require::<NewsClient>().err().unwrap();

        match err {
            AggregateError::ServiceNotRegistered { service } => {
                assert!(service.ends_with("NewsClient"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
