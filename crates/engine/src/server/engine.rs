//! The dispatch engine: one request in, exactly one response out.
//!
//! Every request walks the same states:
//!
//! ```text
//! Received → Routed → BeforeHooks → Handling → AfterHooks → Written
//!                          │                        │
//!                          └── failure ──► Written ◄┘
//! ```
//!
//! A failing `before` hook skips the handler and the `after` hooks. A failing
//! `after` hook replaces whatever the handler buffered. Either failure is
//! answered with `500` and the hook's exception.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use common::error::{codes, messages};
use common::{Exception, Violation};
use http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::identity::ServiceIdentity;
use crate::interceptor::{Chain, InterceptorFactory};
use crate::route::{Controller, EndpointKey, Handler, Router, RouterBuilder};
use crate::scope::Scope;

/// Largest request body read before dispatch, unless overridden with
/// [`EngineBuilder::body_limit`].
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Composes routes and interceptors before serving starts.
pub struct EngineBuilder {
    identity: ServiceIdentity,
    routes: RouterBuilder,
    chain: Chain,
    body_limit: usize,
}

impl EngineBuilder {
    pub fn new(identity: ServiceIdentity) -> Self {
        Self {
            identity,
            routes: RouterBuilder::new(),
            chain: Chain::default(),
            body_limit: MAX_BODY_BYTES,
        }
    }

    /// Cap on request body size; larger bodies are answered with `413`.
    pub fn body_limit(&mut self, bytes: usize) -> &mut Self {
        self.body_limit = bytes;
        self
    }

    /// Bind `handler` to `method` + `path`.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateRoute`] if the canonical key is taken.
    pub fn route<H: Handler>(
        &mut self,
        method: &str,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, EngineError> {
        self.routes.register(method, path, handler)?;
        Ok(self)
    }

    /// Register every route of `controller`, or none of them.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateRoute`] naming the first colliding key.
    pub fn controller<C: Controller + ?Sized>(
        &mut self,
        controller: &C,
    ) -> Result<&mut Self, EngineError> {
        self.routes.register_all(controller.routes())?;
        debug!(url = controller.url(), "controller registered");
        Ok(self)
    }

    /// Append an interceptor factory; a fresh instance wraps every request.
    pub fn interceptor<F: InterceptorFactory>(&mut self, factory: F) -> &mut Self {
        self.chain.push(factory);
        self
    }

    /// Freeze routes and interceptors.
    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(Inner {
                identity: self.identity,
                router: self.routes.build(),
                chain: self.chain,
                body_limit: self.body_limit,
            }),
        }
    }
}

struct Inner {
    identity: ServiceIdentity,
    router: Router,
    chain: Chain,
    body_limit: usize,
}

/// Immutable, cheaply cloneable request dispatcher.
///
/// Also a [`tower::Service`], so it can be driven directly in tests or
/// mounted behind any hyper connection.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn builder(identity: ServiceIdentity) -> EngineBuilder {
        EngineBuilder::new(identity)
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.inner.identity
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Run the full lifecycle for a request whose body has been read.
    pub fn dispatch(&self, parts: http::request::Parts, body: Bytes) -> Response<Full<Bytes>> {
        // Received
        let mut scope = Scope::new(parts, body);

        // Routed
        let key = EndpointKey::new(scope.method().as_str(), scope.path());
        let handler = self.inner.router.lookup(&key);

        // BeforeHooks
        let mut hooks = self.inner.chain.instantiate();
        if let Err(ex) = hooks.before(&scope) {
            warn!(key = %key, code = %ex.code, "before hook failed");
            scope.exception_res(StatusCode::INTERNAL_SERVER_ERROR, &ex);
            return write(scope);
        }

        // Handling
        handler.handle(&mut scope);

        // AfterHooks
        if let Err(ex) = hooks.after(&scope) {
            warn!(key = %key, code = %ex.code, "after hook failed");
            scope.exception_res(StatusCode::INTERNAL_SERVER_ERROR, &ex);
        }

        // Written
        write(scope)
    }

    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }

    /// Read the body of `req` and dispatch it.
    ///
    /// Reading stops as soon as the body exceeds the limit; such a request is
    /// answered with `413`, and one whose body cannot be read with `400`.
    /// Neither is routed.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        match Limited::new(body, self.inner.body_limit).collect().await {
            Ok(collected) => self.dispatch(parts, collected.to_bytes()),
            Err(e) => {
                let (status, ex) = if e.downcast_ref::<LengthLimitError>().is_some() {
                    warn!(
                        path = %parts.uri.path(),
                        limit = self.inner.body_limit,
                        "request body too large"
                    );
                    (
                        StatusCode::PAYLOAD_TOO_LARGE,
                        Exception::new(codes::BODY_TOO_LARGE, messages::BODY_TOO_LARGE)
                            .with(Violation::value(self.inner.body_limit)),
                    )
                } else {
                    warn!(path = %parts.uri.path(), error = %e, "failed to read request body");
                    (
                        StatusCode::BAD_REQUEST,
                        Exception::new(codes::BODY_NOT_READ, messages::BODY_NOT_READ)
                            .with(Violation::value(e.to_string())),
                    )
                };
                let mut scope = Scope::new(parts, Bytes::new());
                scope.exception_res(status, &ex);
                write(scope)
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("identity", &self.inner.identity)
            .field("router", &self.inner.router)
            .field("interceptors", &self.inner.chain.len())
            .field("body_limit", &self.inner.body_limit)
            .finish()
    }
}

impl<B> tower::Service<Request<B>> for Engine
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let engine = self.clone();
        Box::pin(async move { Ok(engine.handle(req).await) })
    }
}

/// Emit the buffered status and body with the fixed response headers.
fn write(scope: Scope) -> Response<Full<Bytes>> {
    let (status, body) = scope.into_response_parts();
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}
