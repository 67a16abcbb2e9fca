use std::{fmt, marker::PhantomData};

use super::call::CallDescriptor;

/// An ordered, immutable set of calls joined into a `Resp`.
///
/// Definitions are built once and shared by every execution, so nothing in
/// here is mutable after construction.
pub struct AggregateDefinition<Req, Resp> {
    calls: Vec<CallDescriptor<Req>>,
    parallel: bool,
    _response: PhantomData<fn() -> Resp>,
}

impl<Req, Resp> AggregateDefinition<Req, Resp> {
    pub fn new(calls: Vec<CallDescriptor<Req>>, parallel: bool) -> Self {
        Self {
            calls,
            parallel,
            _response: PhantomData,
        }
    }

    pub fn calls(&self) -> &[CallDescriptor<Req>] {
        &self.calls
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl<Req, Resp> Clone for AggregateDefinition<Req, Resp> {
    fn clone(&self) -> Self {
        Self::new(self.calls.clone(), self.parallel)
    }
}

impl<Req, Resp> fmt::Debug for AggregateDefinition<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateDefinition")
            .field("calls", &self.calls)
            .field("parallel", &self.parallel)
            .field("response", &std::any::type_name::<Resp>())
            .finish()
    }
}
