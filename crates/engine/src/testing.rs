//! Helpers for unit-testing handlers and resources without a network.
//!
//! ```
//! use engine::testing::{is_json_res, is_status, TestRequest};
//! use engine::Scope;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! let scope = TestRequest::get("/hello")
//!     .query("name", "ana")
//!     .run(&|scope: &mut Scope| {
//!         let name = scope.query_value("name").to_owned();
//!         scope.json_res(StatusCode::OK, &json!({ "hello": name }));
//!     });
//! is_status(&scope, StatusCode::OK).unwrap();
//! is_json_res(&scope, &json!({ "hello": "ana" })).unwrap();
//! ```

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

use crate::route::Handler;
use crate::scope::Scope;

/// Builder for an inbound request, turned into a [`Scope`] or an
/// [`http::Request`].
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
}

impl TestRequest {
    /// An unknown method falls back to `GET`.
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: Method::from_bytes(method.as_bytes()).unwrap_or_default(),
            url: url.to_owned(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str) -> Self {
        Self::new("POST", url)
    }

    /// Append a query parameter, URL-encoded.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Set a header. Names or values that are not valid HTTP are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
        self
    }

    /// Serialise `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body = serde_json::to_vec(body).map(Bytes::from).unwrap_or_default();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// Raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn uri(&self) -> Uri {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }
        url.parse().unwrap_or_default()
    }

    fn into_parts(self) -> (http::request::Parts, Bytes) {
        let mut req = Request::new(());
        *req.uri_mut() = self.uri();
        *req.method_mut() = self.method;
        *req.headers_mut() = self.headers;
        (req.into_parts().0, self.body)
    }

    pub fn into_scope(self) -> Scope {
        let (parts, body) = self.into_parts();
        Scope::new(parts, body)
    }

    pub fn into_request(self) -> Request<Full<Bytes>> {
        let (parts, body) = self.into_parts();
        Request::from_parts(parts, Full::new(body))
    }

    /// Run `handler` against a fresh scope for this request.
    pub fn run<H: Handler + ?Sized>(self, handler: &H) -> Scope {
        let mut scope = self.into_scope();
        handler.handle(&mut scope);
        scope
    }
}

/// Check the buffered status.
pub fn is_status(scope: &Scope, expected: StatusCode) -> Result<(), String> {
    if scope.status() == expected {
        Ok(())
    } else {
        Err(format!(
            "expected status {expected}, got {}",
            scope.status()
        ))
    }
}

/// Check that the buffered body is JSON equal to `expected`.
pub fn is_json_res<T: Serialize + ?Sized>(scope: &Scope, expected: &T) -> Result<(), String> {
    let want = serde_json::to_value(expected)
        .map_err(|e| format!("expected value does not serialise: {e}"))?;
    let got: Value = serde_json::from_slice(scope.body()).map_err(|e| {
        format!(
            "response is not JSON ({e}): {}",
            String::from_utf8_lossy(scope.body())
        )
    })?;
    if got == want {
        Ok(())
    } else {
        Err(format!("expected body {want}, got {got}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_are_encoded_and_appended() {
        let scope = TestRequest::get("/find?a=1")
            .query("b", "x y")
            .query("c", "&")
            .into_scope();
        assert_eq!(scope.path(), "/find");
        assert_eq!(scope.query_value("a"), "1");
        assert_eq!(scope.query_value("b"), "x y");
        assert_eq!(scope.query_value("c"), "&");
    }

    #[test]
    fn json_sets_body_and_content_type() {
        let scope = TestRequest::post("/").json(&json!({"a": 1})).into_scope();
        assert_eq!(scope.raw_body(), br#"{"a":1}"#);
        assert_eq!(scope.header_value("content-type"), Some("application/json"));
    }

    #[test]
    fn unknown_method_falls_back_to_get() {
        let scope = TestRequest::new("NOT A METHOD", "/").into_scope();
        assert_eq!(scope.method(), Method::GET);
    }

    #[test]
    fn assertions_describe_mismatch() {
        let mut scope = TestRequest::get("/").into_scope();
        scope.json_res(StatusCode::CREATED, &json!({"id": 4}));

        assert!(is_status(&scope, StatusCode::CREATED).is_ok());
        let err = is_status(&scope, StatusCode::OK).unwrap_err();
        assert!(err.contains("201"), "{err}");

        assert!(is_json_res(&scope, &json!({"id": 4})).is_ok());
        let err = is_json_res(&scope, &json!({"id": 5})).unwrap_err();
        assert!(err.contains(r#"{"id":4}"#), "{err}");
    }
}
