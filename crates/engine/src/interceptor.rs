//! Before/after hooks wrapped around every handler invocation.
//!
//! Interceptors are registered as factories. The engine asks each factory for
//! a fresh [`Interceptor`] at the start of every request, so hooks that keep
//! state (such as [`Measurement`]) never share it between concurrent
//! requests.
//!
//! Ordering: `before` hooks run in registration order, then the handler, then
//! `after` hooks, again in registration order. The first failing hook stops
//! the remaining hooks of its phase.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Exception;
use http::{Method, StatusCode};
use tracing::info;

use crate::scope::Scope;

/// A before/after hook pair.
///
/// Hooks observe the [`Scope`] but may only mutate their own state.
pub trait Interceptor: Send {
    /// Runs before the handler. A failure skips the handler and every later hook.
    fn before(&mut self, scope: &Scope) -> Result<(), Exception>;

    /// Runs after the handler. A failure replaces the buffered response.
    fn after(&mut self, scope: &Scope) -> Result<(), Exception>;
}

/// Produces one [`Interceptor`] per request.
///
/// Any `Fn() -> I` closure or constructor is a factory, e.g.
/// `Measurement::default`.
pub trait InterceptorFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn Interceptor>;
}

impl<F, I> InterceptorFactory for F
where
    F: Fn() -> I + Send + Sync + 'static,
    I: Interceptor + 'static,
{
    fn create(&self) -> Box<dyn Interceptor> {
        Box::new(self())
    }
}

/// Ordered list of interceptor factories, frozen with the engine.
#[derive(Clone, Default)]
pub struct Chain {
    factories: Vec<Arc<dyn InterceptorFactory>>,
}

impl Chain {
    pub fn push<F: InterceptorFactory>(&mut self, factory: F) {
        self.factories.push(Arc::new(factory));
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Fresh hook instances for one request.
    pub(crate) fn instantiate(&self) -> Hooks {
        Hooks(self.factories.iter().map(|f| f.create()).collect())
    }
}

/// The hook instances owned by one request.
pub(crate) struct Hooks(Vec<Box<dyn Interceptor>>);

impl Hooks {
    pub(crate) fn before(&mut self, scope: &Scope) -> Result<(), Exception> {
        self.0.iter_mut().try_for_each(|h| h.before(scope))
    }

    pub(crate) fn after(&mut self, scope: &Scope) -> Result<(), Exception> {
        self.0.iter_mut().try_for_each(|h| h.after(scope))
    }
}

/// Records method, resource, final status and latency of a request, and logs
/// them once the handler has run.
#[derive(Debug, Default)]
pub struct Measurement {
    start: Option<Instant>,
    method: Method,
    resource: String,
    status: Option<StatusCode>,
    duration: Option<Duration>,
}

impl Measurement {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Interceptor for Measurement {
    fn before(&mut self, scope: &Scope) -> Result<(), Exception> {
        self.start = Some(Instant::now());
        self.method = scope.method().clone();
        self.resource = scope.path().to_owned();
        Ok(())
    }

    fn after(&mut self, scope: &Scope) -> Result<(), Exception> {
        let elapsed = self.start.map(|s| s.elapsed()).unwrap_or_default();
        self.duration = Some(elapsed);
        self.status = Some(scope.status());
        info!(
            method = %self.method,
            resource = %self.resource,
            status = scope.status().as_u16(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            request_id = %scope.request_id(),
            "request served"
        );
        Ok(())
    }
}
