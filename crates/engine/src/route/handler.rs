//! Request handlers.

use common::protocol::Void;
use http::StatusCode;

use crate::scope::Scope;

/// Handles one request by buffering a response on the [`Scope`].
///
/// Handlers run to completion once invoked. Their only externally visible
/// effect is the buffered response, plus any side-channel data they store.
///
/// Any `Fn(&mut Scope)` closure is a handler:
///
/// ```
/// use engine::{Handler, Scope};
/// use http::StatusCode;
///
/// let h = |scope: &mut Scope| scope.json_res(StatusCode::OK, &serde_json::json!({"ok": true}));
/// fn assert_handler<H: Handler>(_: &H) {}
/// assert_handler(&h);
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, scope: &mut Scope);
}

impl<F> Handler for F
where
    F: Fn(&mut Scope) + Send + Sync + 'static,
{
    fn handle(&self, scope: &mut Scope) {
        self(scope)
    }
}

/// Fallback for requests with no registered route: `404` with body `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl Handler for NotFound {
    fn handle(&self, scope: &mut Scope) {
        scope.json_res(StatusCode::NOT_FOUND, &Void {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRequest;

    #[test]
    fn not_found_buffers_404_and_empty_object() {
        let mut scope = TestRequest::get("/nowhere").into_scope();
        NotFound.handle(&mut scope);
        assert_eq!(scope.status(), StatusCode::NOT_FOUND);
        assert_eq!(scope.body(), b"{}");
    }

    #[test]
    fn closures_are_handlers() {
        let h = |scope: &mut Scope| scope.json_res(StatusCode::ACCEPTED, &Void {});
        let mut scope = TestRequest::get("/").into_scope();
        h.handle(&mut scope);
        assert_eq!(scope.status(), StatusCode::ACCEPTED);
    }
}
