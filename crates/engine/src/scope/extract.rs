//! Declarative field extraction and validation.
//!
//! A destination type describes its fields once, as a static table of
//! [`FieldDescriptor`]s, and receives coerced values through
//! [`Schema::assign`]:
//!
//! ```
//! use engine::scope::{FieldDescriptor, FieldKind, FieldValue, Schema};
//!
//! #[derive(Default)]
//! struct Paging {
//!     cursor: String,
//!     limit: i64,
//! }
//!
//! impl Schema for Paging {
//!     const FIELDS: &'static [FieldDescriptor] = &[
//!         FieldDescriptor::new("Cursor", "cursor", FieldKind::String).required(),
//!         FieldDescriptor::new("Limit", "limit", FieldKind::Integer),
//!     ];
//!
//!     fn assign(&mut self, field: &str, value: FieldValue) {
//!         match (field, value) {
//!             ("Cursor", FieldValue::String(v)) => self.cursor = v,
//!             ("Limit", FieldValue::Integer(v)) => self.limit = v,
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! Rules are evaluated against the raw value as it arrived, before coercion.
//! Every violation of every field is collected into one `fwork_vf` exception.

use common::error::{codes, messages};
use common::{Exception, Violation};
use serde_json::Value;

use super::Scope;

/// Semantic type a field is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Never assigned; rules are still evaluated.
    Unsupported,
}

/// A coerced value handed to [`Schema::assign`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

/// Validation rule attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Fails when the raw value is absent, `null`, or the empty string.
    /// `0` and `false` are present.
    Required,
}

impl Rule {
    /// Name reported in the violation's `tag`.
    pub fn tag(self) -> &'static str {
        match self {
            Rule::Required => "required",
        }
    }

    fn violated_by(self, raw: &RawValue<'_>) -> bool {
        match self {
            Rule::Required => matches!(
                raw,
                RawValue::Absent
                    | RawValue::Text("")
                    | RawValue::Json(Value::Null)
            ) || matches!(raw, RawValue::Json(Value::String(s)) if s.is_empty()),
        }
    }
}

/// One extractable field of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name reported in violations and passed to [`Schema::assign`].
    pub name: &'static str,
    /// Query parameter, header, or JSON key to read from.
    pub source: &'static str,
    pub kind: FieldKind,
    pub rules: &'static [Rule],
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, source: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            source,
            kind,
            rules: &[],
        }
    }

    pub const fn rules(self, rules: &'static [Rule]) -> Self {
        Self { rules, ..self }
    }

    /// Shorthand for `.rules(&[Rule::Required])`.
    pub const fn required(self) -> Self {
        self.rules(&[Rule::Required])
    }
}

/// A destination structure that can be populated from a request.
pub trait Schema {
    /// Field table, processed in order.
    const FIELDS: &'static [FieldDescriptor];

    /// Store a coerced value for the field called `field`.
    fn assign(&mut self, field: &str, value: FieldValue);
}

/// A value as read from its source, before coercion.
#[derive(Debug, Clone, Copy)]
enum RawValue<'a> {
    Absent,
    Text(&'a str),
    Json(&'a Value),
}

impl RawValue<'_> {
    fn to_json(self) -> Value {
        match self {
            RawValue::Absent => Value::Null,
            RawValue::Text(s) => Value::String(s.to_owned()),
            RawValue::Json(v) => v.clone(),
        }
    }

    /// Coerce into `kind`.
    ///
    /// Text never fails: unparsable input becomes the kind's zero value. JSON
    /// of the wrong type fails with the expected type's name; `null` and
    /// absent keys become zero values.
    fn coerce(self, kind: FieldKind) -> Result<Option<FieldValue>, &'static str> {
        match self {
            RawValue::Absent => Ok(coerce_text(kind, "")),
            RawValue::Text(s) => Ok(coerce_text(kind, s)),
            RawValue::Json(Value::Null) => Ok(coerce_text(kind, "")),
            RawValue::Json(v) => coerce_json(kind, v),
        }
    }
}

fn coerce_text(kind: FieldKind, s: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::String => Some(FieldValue::String(s.to_owned())),
        FieldKind::Integer => Some(FieldValue::Integer(s.parse().unwrap_or(0))),
        FieldKind::Float => Some(FieldValue::Float(s.parse().unwrap_or(0.0))),
        FieldKind::Boolean => Some(FieldValue::Boolean(parse_bool(s).unwrap_or(false))),
        FieldKind::Unsupported => None,
    }
}

fn coerce_json(kind: FieldKind, v: &Value) -> Result<Option<FieldValue>, &'static str> {
    match kind {
        FieldKind::String => v
            .as_str()
            .map(|s| Some(FieldValue::String(s.to_owned())))
            .ok_or("string"),
        FieldKind::Integer => v
            .as_i64()
            .map(|n| Some(FieldValue::Integer(n)))
            .ok_or("integer"),
        FieldKind::Float => v
            .as_f64()
            .map(|n| Some(FieldValue::Float(n)))
            .ok_or("float"),
        FieldKind::Boolean => v
            .as_bool()
            .map(|b| Some(FieldValue::Boolean(b)))
            .ok_or("boolean"),
        FieldKind::Unsupported => Ok(None),
    }
}

/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn invalid_json(detail: impl Into<Value>) -> Exception {
    Exception::new(codes::INVALID_JSON, messages::INVALID_JSON).with(Violation::value(detail))
}

/// Assign every coerced value and evaluate every rule, collecting violations.
fn bind<T: Schema>(
    dest: &mut T,
    fields: Vec<(&'static FieldDescriptor, RawValue<'_>, Option<FieldValue>)>,
) -> Result<(), Exception> {
    let mut ex = Exception::builder()
        .code(codes::VALIDATION_FAILED)
        .message(messages::VALIDATION_FAILED);
    for (field, raw, value) in fields {
        if let Some(value) = value {
            dest.assign(field.name, value);
        }
        for rule in field.rules {
            if rule.violated_by(&raw) {
                ex.include(Violation::new(field.name, rule.tag(), raw.to_json()));
            }
        }
    }
    if ex.is_empty() {
        Ok(())
    } else {
        Err(ex.build())
    }
}

impl Scope {
    /// Populate `dest` from query parameters and validate it.
    ///
    /// # Errors
    ///
    /// A `fwork_vf` exception listing every violation.
    pub fn validate_query<T: Schema>(&self, dest: &mut T) -> Result<(), Exception> {
        let fields = T::FIELDS
            .iter()
            .map(|f| {
                let raw = self
                    .query
                    .get(f.source)
                    .map_or(RawValue::Absent, |v| RawValue::Text(v));
                (f, raw, coerce_text(f.kind, text_of(raw)))
            })
            .collect();
        bind(dest, fields)
    }

    /// Populate `dest` from request headers and validate it.
    ///
    /// Headers that are not valid UTF-8 count as absent.
    ///
    /// # Errors
    ///
    /// A `fwork_vf` exception listing every violation.
    pub fn validate_headers<T: Schema>(&self, dest: &mut T) -> Result<(), Exception> {
        let fields = T::FIELDS
            .iter()
            .map(|f| {
                let raw = self
                    .header_value(f.source)
                    .map_or(RawValue::Absent, RawValue::Text);
                (f, raw, coerce_text(f.kind, text_of(raw)))
            })
            .collect();
        bind(dest, fields)
    }

    /// Populate `dest` from a JSON object body and validate it.
    ///
    /// # Errors
    ///
    /// - `fwork_ij` if the body is not a JSON object, or a present value has
    ///   the wrong JSON type. `dest` is not touched in this case.
    /// - `fwork_vf` listing every rule violation.
    pub fn validate_json_body<T: Schema>(&self, dest: &mut T) -> Result<(), Exception> {
        let doc: Value =
            serde_json::from_slice(&self.body).map_err(|e| invalid_json(e.to_string()))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| invalid_json("expected a JSON object"))?;

        let mut mismatches = Exception::builder()
            .code(codes::INVALID_JSON)
            .message(messages::INVALID_JSON);
        let mut fields = Vec::with_capacity(T::FIELDS.len());
        for f in T::FIELDS {
            let raw = obj.get(f.source).map_or(RawValue::Absent, RawValue::Json);
            match raw.coerce(f.kind) {
                Ok(value) => fields.push((f, raw, value)),
                Err(expected) => mismatches.include(Violation::new(f.name, expected, raw.to_json())),
            }
        }
        if !mismatches.is_empty() {
            return Err(mismatches.build());
        }
        bind(dest, fields)
    }
}

fn text_of(raw: RawValue<'_>) -> &str {
    match raw {
        RawValue::Text(s) => s,
        _ => "",
    }
}
