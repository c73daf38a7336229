//! Per-request context handed to interceptors and handlers.
//!
//! A [`Scope`] is created when a request arrives, owned exclusively by the
//! task serving that request, and consumed when the response is written. It
//! carries:
//!
//! - the inbound request (method, path, query, headers, body bytes);
//! - a side-channel key/value store for data passed between hooks and
//!   handlers;
//! - the buffered response (status + serialised JSON body), which is not
//!   sent until dispatch finishes.

pub mod extract;

pub use extract::{FieldDescriptor, FieldKind, FieldValue, Rule, Schema};

use std::any::Any;
use std::collections::HashMap;

use bytes::Bytes;
use common::error::{codes, messages};
use common::protocol::{ExceptionEnvelope, Success};
use common::{Exception, Violation};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Body buffered before any handler runs.
const EMPTY_OBJECT: &[u8] = b"{}";

/// Per-request mutable context.
pub struct Scope {
    request_id: Uuid,
    method: Method,
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
    status: StatusCode,
    response: Bytes,
}

impl Scope {
    /// Bind a fresh scope to an inbound request whose body is fully read.
    ///
    /// The response starts as `200` with body `{}`.
    pub fn new(parts: http::request::Parts, body: Bytes) -> Self {
        let mut query = HashMap::new();
        if let Some(q) = parts.uri.query() {
            for (k, v) in form_urlencoded::parse(q.as_bytes()) {
                // First occurrence wins.
                query.entry(k.into_owned()).or_insert_with(|| v.into_owned());
            }
        }
        Self {
            request_id: Uuid::new_v4(),
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query,
            headers: parts.headers,
            body,
            data: HashMap::new(),
            status: StatusCode::OK,
            response: Bytes::from_static(EMPTY_OBJECT),
        }
    }

    // -----------------------------------------------------------------------
    // Request accessors
    // -----------------------------------------------------------------------

    /// Unique id of this request, used as the envelope transaction id.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of query parameter `key`, or `""` if absent.
    pub fn query_value(&self, key: &str) -> &str {
        self.query.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value of header `name` if present and valid UTF-8.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw request body bytes.
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    // -----------------------------------------------------------------------
    // Side-channel data
    // -----------------------------------------------------------------------

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Fails with code `fwork_dk` if `key` is already present; the stored
    /// value is left untouched.
    pub fn set_data<T>(&mut self, key: impl Into<String>, value: T) -> Result<(), Exception>
    where
        T: Any + Send + Sync,
    {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(Exception::new(codes::DUPLICATED_KEY, messages::DUPLICATED_KEY)
                .with(Violation::new(key, "", serde_json::Value::Null)));
        }
        self.data.insert(key, Box::new(value));
        Ok(())
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn override_data<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Borrow the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Fails with code `fwork_knf` if `key` is absent, or `fwork_dtm` if the
    /// value was stored with a different type than `T`.
    pub fn get_data<T: Any>(&self, key: &str) -> Result<&T, Exception> {
        let value = self.data.get(key).ok_or_else(|| key_not_found(key))?;
        value.downcast_ref::<T>().ok_or_else(|| type_mismatch::<T>(key))
    }

    /// Move the value stored under `key` out of the scope.
    ///
    /// # Errors
    ///
    /// Same as [`Scope::get_data`]. On a type mismatch the value stays stored.
    pub fn take_data<T: Any>(&mut self, key: &str) -> Result<T, Exception> {
        let value = self.data.remove(key).ok_or_else(|| key_not_found(key))?;
        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(original) => {
                self.data.insert(key.to_owned(), original);
                Err(type_mismatch::<T>(key))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Response buffering
    // -----------------------------------------------------------------------

    /// Buffer `body` serialised as JSON with `status`.
    ///
    /// Nothing touches the network here. If serialisation fails the buffer
    /// holds an error envelope and the status becomes `500`.
    pub fn json_res<T: Serialize + ?Sized>(&mut self, status: StatusCode, body: &T) {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.status = status;
                self.response = Bytes::from(bytes);
            }
            Err(e) => {
                warn!(error = %e, path = %self.path, "failed to encode reply");
                let ex = Exception::new(codes::RESOURCE_NOT_ENCODED, messages::RESOURCE_NOT_ENCODED)
                    .with(Violation::value(e.to_string()));
                self.exception_res(StatusCode::INTERNAL_SERVER_ERROR, &ex);
            }
        }
    }

    /// Buffer `payload` wrapped in a success envelope.
    pub fn success_res<T: Serialize>(&mut self, status: StatusCode, payload: T) {
        let envelope = Success {
            payload,
            transaction_id: self.request_id.to_string(),
        };
        self.json_res(status, &envelope);
    }

    /// Buffer `exception` wrapped in an error envelope.
    pub fn exception_res(&mut self, status: StatusCode, exception: &Exception) {
        let envelope = ExceptionEnvelope {
            payload: exception.clone(),
            transaction_id: self.request_id.to_string(),
        };
        // An exception envelope is plain strings and JSON values; it always encodes.
        self.response = serde_json::to_vec(&envelope)
            .map(Bytes::from)
            .unwrap_or_else(|_| Bytes::from_static(EMPTY_OBJECT));
        self.status = status;
    }

    /// Currently buffered status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Currently buffered body.
    pub fn body(&self) -> &[u8] {
        &self.response
    }

    /// Consume the scope, yielding the buffered status and body.
    pub(crate) fn into_response_parts(self) -> (StatusCode, Bytes) {
        (self.status, self.response)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .field("status", &self.status)
            .finish()
    }
}

fn key_not_found(key: &str) -> Exception {
    Exception::new(codes::KEY_NOT_FOUND, messages::KEY_NOT_FOUND)
        .with(Violation::new(key, "", serde_json::Value::Null))
}

fn type_mismatch<T>(key: &str) -> Exception {
    Exception::new(codes::DATA_TYPE_MISMATCH, messages::DATA_TYPE_MISMATCH)
        .with(Violation::new(key, "", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRequest;
    use serde_json::json;

    #[test]
    fn set_then_get_returns_stored_value() {
        let mut s = TestRequest::get("/").into_scope();
        s.set_data("user", String::from("ana")).unwrap();
        assert_eq!(s.get_data::<String>("user").unwrap(), "ana");
    }

    #[test]
    fn set_twice_fails_and_keeps_original() {
        let mut s = TestRequest::get("/").into_scope();
        s.set_data("n", 1u32).unwrap();
        let err = s.set_data("n", 2u32).unwrap_err();
        assert_eq!(err.code, codes::DUPLICATED_KEY);
        assert_eq!(*s.get_data::<u32>("n").unwrap(), 1);
    }

    #[test]
    fn override_replaces() {
        let mut s = TestRequest::get("/").into_scope();
        s.override_data("n", 1u32);
        s.override_data("n", 2u32);
        assert_eq!(*s.get_data::<u32>("n").unwrap(), 2);
    }

    #[test]
    fn get_absent_key_fails() {
        let s = TestRequest::get("/").into_scope();
        let err = s.get_data::<u32>("missing").unwrap_err();
        assert_eq!(err.code, codes::KEY_NOT_FOUND);
        assert_eq!(err.data[0].name, "missing");
    }

    #[test]
    fn get_with_wrong_type_fails() {
        let mut s = TestRequest::get("/").into_scope();
        s.set_data("n", 1u32).unwrap();
        let err = s.get_data::<String>("n").unwrap_err();
        assert_eq!(err.code, codes::DATA_TYPE_MISMATCH);
    }

    #[test]
    fn take_moves_value_out() {
        let mut s = TestRequest::get("/").into_scope();
        s.set_data("v", vec![1, 2, 3]).unwrap();
        assert!(s.take_data::<String>("v").is_err());
        assert_eq!(s.take_data::<Vec<i32>>("v").unwrap(), vec![1, 2, 3]);
        assert!(s.get_data::<Vec<i32>>("v").is_err());
    }

    #[test]
    fn default_response_is_ok_empty_object() {
        let s = TestRequest::get("/").into_scope();
        assert_eq!(s.status(), StatusCode::OK);
        assert_eq!(s.body(), b"{}");
    }

    #[test]
    fn json_res_buffers_serialised_body() {
        let mut s = TestRequest::get("/").into_scope();
        s.json_res(StatusCode::ACCEPTED, &json!({"a": 1}));
        assert_eq!(s.status(), StatusCode::ACCEPTED);
        assert_eq!(s.body(), br#"{"a":1}"#);
    }

    #[test]
    fn json_res_encode_failure_becomes_500() {
        struct Unencodable;
        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("nope"))
            }
        }
        let mut s = TestRequest::get("/").into_scope();
        s.json_res(StatusCode::OK, &Unencodable);
        assert_eq!(s.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v: serde_json::Value = serde_json::from_slice(s.body()).unwrap();
        assert_eq!(v["payload"]["code"], codes::RESOURCE_NOT_ENCODED);
    }

    #[test]
    fn success_envelope_carries_request_id() {
        let mut s = TestRequest::get("/").into_scope();
        s.success_res(StatusCode::OK, json!({"x": true}));
        let v: serde_json::Value = serde_json::from_slice(s.body()).unwrap();
        assert_eq!(v["payload"], json!({"x": true}));
        assert_eq!(v["transaction_id"], s.request_id().to_string());
    }

    #[test]
    fn query_first_value_wins_and_absent_is_empty() {
        let s = TestRequest::get("/search?q=rust&q=go&n=%20x").into_scope();
        assert_eq!(s.path(), "/search");
        assert_eq!(s.query_value("q"), "rust");
        assert_eq!(s.query_value("n"), " x");
        assert_eq!(s.query_value("missing"), "");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let s = TestRequest::get("/")
            .header("X-Tenant", "acme")
            .into_scope();
        assert_eq!(s.header_value("x-tenant"), Some("acme"));
        assert_eq!(s.header_value("x-other"), None);
    }
}
