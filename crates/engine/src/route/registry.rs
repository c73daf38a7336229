//! Route registry: built once during startup, then frozen.
//!
//! [`RouterBuilder`] is the only way to add routes. [`RouterBuilder::build`]
//! consumes it, so a [`Router`] handed to the serving loop can never be
//! mutated again and is safe to read from any number of tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::handler::{Handler, NotFound};
use super::key::EndpointKey;
use crate::error::EngineError;

/// Mutable registry used during composition.
#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<EndpointKey, Arc<dyn Handler>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `method` + `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateRoute`] if the canonical key is already
    /// bound; the registry is left unchanged.
    pub fn register<H: Handler>(
        &mut self,
        method: &str,
        path: &str,
        handler: H,
    ) -> Result<(), EngineError> {
        self.register_all([(EndpointKey::new(method, path), Arc::new(handler) as Arc<dyn Handler>)])
    }

    /// Bind every `(key, handler)` pair, or none of them.
    ///
    /// Collisions with existing routes and within `routes` itself are both
    /// detected before anything is inserted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateRoute`] naming the first colliding key.
    pub fn register_all<I>(&mut self, routes: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (EndpointKey, Arc<dyn Handler>)>,
    {
        let mut staged: HashMap<EndpointKey, Arc<dyn Handler>> = HashMap::new();
        for (key, handler) in routes {
            if self.routes.contains_key(&key) || staged.contains_key(&key) {
                return Err(EngineError::DuplicateRoute {
                    key: key.to_string(),
                });
            }
            staged.insert(key, handler);
        }
        for key in staged.keys() {
            debug!(key = %key, "route registered");
        }
        self.routes.extend(staged);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the registry.
    pub fn build(self) -> Router {
        Router { routes: self.routes }
    }
}

/// Immutable registry consulted by the dispatch engine.
pub struct Router {
    routes: HashMap<EndpointKey, Arc<dyn Handler>>,
}

impl Router {
    /// Resolve `key` to its handler, or to the not-found handler on a miss.
    ///
    /// Never fails and never mutates the registry.
    pub fn lookup(&self, key: &EndpointKey) -> &dyn Handler {
        match self.routes.get(key) {
            Some(handler) => &**handler,
            None => &NotFound,
        }
    }

    /// Returns `true` if `key` has a registered handler.
    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.routes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered keys in lexicographic order.
    pub fn keys(&self) -> Vec<&EndpointKey> {
        let mut keys: Vec<_> = self.routes.keys().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("routes", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::testing::TestRequest;
    use http::StatusCode;
    use serde_json::json;

    fn reply(tag: &'static str) -> impl Handler {
        move |scope: &mut Scope| scope.json_res(StatusCode::OK, &json!({ "handler": tag }))
    }

    fn run(router: &Router, method: &str, path: &str) -> Scope {
        let mut scope = TestRequest::new(method, path).into_scope();
        router.lookup(&EndpointKey::new(method, path)).handle(&mut scope);
        scope
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut b = RouterBuilder::new();
        b.register("GET", "/Items", reply("items")).unwrap();
        let router = b.build();
        let scope = run(&router, "get", "/items");
        assert_eq!(scope.status(), StatusCode::OK);
        assert_eq!(scope.body(), br#"{"handler":"items"}"#);
    }

    #[test]
    fn duplicate_registration_keeps_original() {
        let mut b = RouterBuilder::new();
        b.register("GET", "/items", reply("first")).unwrap();
        let err = b.register("get", "/ITEMS", reply("second")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRoute { ref key } if key == "get-/items"));
        assert_eq!(b.len(), 1);

        let router = b.build();
        let scope = run(&router, "GET", "/items");
        assert_eq!(scope.body(), br#"{"handler":"first"}"#);
    }

    #[test]
    fn register_all_is_atomic() {
        let mut b = RouterBuilder::new();
        b.register("GET", "/a", reply("a")).unwrap();
        let batch: Vec<(EndpointKey, Arc<dyn Handler>)> = vec![
            (EndpointKey::new("POST", "/a"), Arc::new(reply("post-a"))),
            (EndpointKey::new("GET", "/a"), Arc::new(reply("dup"))),
        ];
        assert!(b.register_all(batch).is_err());
        assert_eq!(b.len(), 1);
        assert!(!b.build().contains(&EndpointKey::new("POST", "/a")));
    }

    #[test]
    fn register_all_detects_collision_within_batch() {
        let mut b = RouterBuilder::new();
        let batch: Vec<(EndpointKey, Arc<dyn Handler>)> = vec![
            (EndpointKey::new("GET", "/b"), Arc::new(reply("1"))),
            (EndpointKey::new("get", "/B"), Arc::new(reply("2"))),
        ];
        assert!(b.register_all(batch).is_err());
        assert!(b.is_empty());
    }

    #[test]
    fn miss_falls_back_to_not_found() {
        let router = RouterBuilder::new().build();
        let scope = run(&router, "GET", "/unknown");
        assert_eq!(scope.status(), StatusCode::NOT_FOUND);
        assert_eq!(scope.body(), b"{}");
    }

    #[test]
    fn keys_are_sorted() {
        let mut b = RouterBuilder::new();
        b.register("POST", "/b", reply("x")).unwrap();
        b.register("GET", "/a", reply("y")).unwrap();
        let router = b.build();
        let keys: Vec<_> = router.keys().into_iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["get-/a", "post-/b"]);
    }
}
