//! JSON body shapes written by the engine and by handlers.
//!
//! Every response body is valid JSON; a void reply is the empty object `{}`.

use serde::{Deserialize, Serialize};

use crate::error::Exception;

// ---------------------------------------------------------------------------
// Void
// ---------------------------------------------------------------------------

/// Empty reply body, serialised as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Void {}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Successful reply wrapping an arbitrary payload with the request's
/// transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Success<T> {
    pub payload: T,
    pub transaction_id: String,
}

/// Error reply wrapping an [`Exception`] with the request's transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionEnvelope {
    pub payload: Exception,
    pub transaction_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    #[test]
    fn void_is_empty_object() {
        assert_eq!(serde_json::to_string(&Void {}).unwrap(), "{}");
    }

    #[test]
    fn success_envelope_shape() {
        let s = Success {
            payload: json!({"id": 7}),
            transaction_id: "tx-1".into(),
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v, json!({"payload": {"id": 7}, "transaction_id": "tx-1"}));
    }

    #[test]
    fn exception_envelope_round_trip() {
        let env = ExceptionEnvelope {
            payload: Exception::new(codes::INTERNAL, "boom"),
            transaction_id: "tx-2".into(),
        };
        let json = serde_json::to_string(&env).unwrap();
        let decoded: ExceptionEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.payload.code, "fwork_ie");
        assert_eq!(decoded.transaction_id, "tx-2");
    }
}
