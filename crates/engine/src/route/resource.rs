//! Grouping of handlers per URL.
//!
//! A [`Resource`] binds up to one handler per method for a single URL. Any
//! type implementing [`Controller`] can be handed to
//! [`EngineBuilder::controller`](crate::EngineBuilder::controller), which
//! registers all of its routes or none of them.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use super::handler::{Handler, NotFound};
use super::key::EndpointKey;

/// A set of routes contributed at composition time.
pub trait Controller {
    /// URL the routes are mounted on.
    fn url(&self) -> &str;

    /// Every route with its canonical key.
    fn routes(&self) -> Vec<(EndpointKey, Arc<dyn Handler>)>;

    /// Resolve the handler for `method` + `url`, falling back to [`NotFound`].
    fn handler(&self, method: &str, url: &str) -> Arc<dyn Handler> {
        let key = EndpointKey::new(method, url);
        self.routes()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, h)| h)
            .unwrap_or_else(|| Arc::new(NotFound))
    }
}

/// Optional handler per method for one URL.
#[derive(Default, Clone)]
pub struct Endpoints {
    pub get: Option<Arc<dyn Handler>>,
    pub post: Option<Arc<dyn Handler>>,
    pub put: Option<Arc<dyn Handler>>,
    pub patch: Option<Arc<dyn Handler>>,
    pub delete: Option<Arc<dyn Handler>>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<H: Handler>(mut self, handler: H) -> Self {
        self.get = Some(Arc::new(handler));
        self
    }

    pub fn post<H: Handler>(mut self, handler: H) -> Self {
        self.post = Some(Arc::new(handler));
        self
    }

    pub fn put<H: Handler>(mut self, handler: H) -> Self {
        self.put = Some(Arc::new(handler));
        self
    }

    pub fn patch<H: Handler>(mut self, handler: H) -> Self {
        self.patch = Some(Arc::new(handler));
        self
    }

    pub fn delete<H: Handler>(mut self, handler: H) -> Self {
        self.delete = Some(Arc::new(handler));
        self
    }
}

/// Handlers for one URL keyed by method.
#[derive(Clone)]
pub struct Resource {
    url: String,
    routes: HashMap<EndpointKey, Arc<dyn Handler>>,
}

impl Resource {
    pub fn new(url: impl Into<String>, endpoints: Endpoints) -> Self {
        let url = url.into();
        let by_method = [
            (Method::GET, endpoints.get),
            (Method::POST, endpoints.post),
            (Method::PUT, endpoints.put),
            (Method::PATCH, endpoints.patch),
            (Method::DELETE, endpoints.delete),
        ];
        let routes = by_method
            .into_iter()
            .filter_map(|(method, handler)| {
                handler.map(|h| (EndpointKey::new(method.as_str(), &url), h))
            })
            .collect();
        Self { url, routes }
    }
}

impl Controller for Resource {
    fn url(&self) -> &str {
        &self.url
    }

    fn routes(&self) -> Vec<(EndpointKey, Arc<dyn Handler>)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|(k, h)| (k.clone(), Arc::clone(h)))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }

    fn handler(&self, method: &str, url: &str) -> Arc<dyn Handler> {
        self.routes
            .get(&EndpointKey::new(method, url))
            .cloned()
            .unwrap_or_else(|| Arc::new(NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::testing::{is_json_res, is_status, TestRequest};
    use common::protocol::Void;
    use http::StatusCode;

    fn created(scope: &mut Scope) {
        scope.json_res(StatusCode::CREATED, &Void {});
    }

    fn listed(scope: &mut Scope) {
        scope.json_res(StatusCode::OK, &vec!["a", "b"]);
    }

    #[test]
    fn only_supplied_methods_are_routed() {
        let r = Resource::new("/items", Endpoints::new().get(listed).post(created));
        let keys: Vec<_> = r.routes().into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["get-/items", "post-/items"]);
        assert_eq!(r.url(), "/items");
    }

    #[test]
    fn handler_resolves_by_method() {
        let r = Resource::new("/items", Endpoints::new().get(listed).post(created));
        let mut scope = TestRequest::post("/items").into_scope();
        r.handler("POST", "/items").handle(&mut scope);
        is_status(&scope, StatusCode::CREATED).unwrap();
        is_json_res(&scope, &Void {}).unwrap();
    }

    #[test]
    fn unknown_method_falls_back_to_not_found() {
        let r = Resource::new("/items", Endpoints::new().get(listed));
        let mut scope = TestRequest::new("DELETE", "/items").into_scope();
        r.handler("DELETE", "/items").handle(&mut scope);
        is_status(&scope, StatusCode::NOT_FOUND).unwrap();
    }
}
