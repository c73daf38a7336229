//! The error value every failure is expressed as on the wire.
//!
//! An [`Exception`] carries a short symbolic code, a human-readable message and
//! a list of [`Violation`]s describing which fields failed which rule. It is
//! serialised as-is into error responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable symbolic codes carried by [`Exception::code`].
pub mod codes {
    /// A scope data key was set twice.
    pub const DUPLICATED_KEY: &str = "fwork_dk";
    /// A scope data key was read but never set.
    pub const KEY_NOT_FOUND: &str = "fwork_knf";
    /// A scope data key holds a value of a different type than requested.
    pub const DATA_TYPE_MISMATCH: &str = "fwork_dtm";
    /// The request body is not valid JSON for the requested shape.
    pub const INVALID_JSON: &str = "fwork_ij";
    /// One or more extracted fields violated a validation rule.
    pub const VALIDATION_FAILED: &str = "fwork_vf";
    /// A route was registered twice.
    pub const RESOURCE_DUPLICATED: &str = "fwork_rd";
    /// The RSA key pair could not be generated.
    pub const KEY_GENERATION_FAILED: &str = "fwork_kgf";
    /// The certificate could not be constructed.
    pub const RESOURCE_NOT_GENERATED: &str = "fwork_rng";
    /// A certificate, key or reply could not be encoded.
    pub const RESOURCE_NOT_ENCODED: &str = "fwork_rne";
    /// The certificate and key do not form a usable TLS credential.
    pub const RESOURCES_NOT_PAIRED: &str = "fwork_rnp";
    /// The listener stopped accepting connections.
    pub const RESOURCE_CLOSED: &str = "fwork_rc";
    /// The request body could not be read from the connection.
    pub const BODY_NOT_READ: &str = "fwork_bnr";
    /// The request body exceeded the engine's size limit.
    pub const BODY_TOO_LARGE: &str = "fwork_btl";
    /// Catch-all for internal failures.
    pub const INTERNAL: &str = "fwork_ie";
}

/// Human-readable messages paired with [`codes`].
pub mod messages {
    pub const DUPLICATED_KEY: &str = "duplicated key";
    pub const KEY_NOT_FOUND: &str = "key not found";
    pub const DATA_TYPE_MISMATCH: &str = "data type mismatch";
    pub const INVALID_JSON: &str = "invalid json";
    pub const VALIDATION_FAILED: &str = "validation failed";
    pub const RESOURCE_DUPLICATED: &str = "resource duplicated";
    pub const KEY_GENERATION_FAILED: &str = "key generation failed";
    pub const RESOURCE_NOT_GENERATED: &str = "resource not generated";
    pub const RESOURCE_NOT_ENCODED: &str = "resource not encoded";
    pub const RESOURCES_NOT_PAIRED: &str = "resources not paired";
    pub const RESOURCE_CLOSED: &str = "resource closed";
    pub const BODY_NOT_READ: &str = "request body not read";
    pub const BODY_TOO_LARGE: &str = "request body too large";
    pub const INTERNAL: &str = "internal error";
}

/// One atomic piece of failure detail: which field broke which rule, and the
/// offending value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Field (or resource) name the detail refers to.
    #[serde(default)]
    pub name: String,
    /// Violated rule, e.g. `"required"`. Empty for non-validation details.
    #[serde(default)]
    pub tag: String,
    /// Offending value; `null` when the value was absent.
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Violation {
    /// A violation of `tag` by field `name` holding `value`.
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// A detail that only carries a value, e.g. the text of an underlying error.
    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        Self::new("", "", value)
    }
}

/// Serializable error artifact produced by every fallible operation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message} ({} detail(s))", .data.len())]
pub struct Exception {
    /// Short machine-readable code, one of [`codes`] for engine failures.
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
    /// Per-field details; omitted from JSON when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Violation>,
}

impl Exception {
    /// An exception with no details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: Vec::new(),
        }
    }

    /// Start building an exception detail by detail.
    pub fn builder() -> ExceptionBuilder {
        ExceptionBuilder::default()
    }

    /// Append one detail.
    pub fn with(mut self, violation: Violation) -> Self {
        self.data.push(violation);
        self
    }

    /// Generic internal error carrying `detail` as its only value.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INTERNAL, messages::INTERNAL).with(Violation::value(detail.to_string()))
    }
}

/// Incremental builder for an [`Exception`].
///
/// Validation uses it to accumulate every violation before deciding whether
/// anything failed at all.
#[derive(Debug, Default, Clone)]
pub struct ExceptionBuilder {
    code: String,
    message: String,
    data: Vec<Violation>,
}

impl ExceptionBuilder {
    /// Overwrite the code.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Overwrite the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add one detail.
    pub fn include(&mut self, violation: Violation) {
        self.data.push(violation);
    }

    /// Returns `true` if no detail has been included.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(self) -> Exception {
        Exception {
            code: self.code,
            message: self.message,
            data: self.data,
        }
    }
}
