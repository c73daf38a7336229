//! Demonstration routes mounted by the binary.
//!
//! | Method | Path      | Handler        |
//! |--------|-----------|----------------|
//! | GET    | `/health` | [`health`]     |
//! | GET    | `/echo`   | [`echo_query`] |
//! | POST   | `/echo`   | [`echo_body`]  |

use common::Exception;
use engine::scope::{FieldDescriptor, FieldKind, FieldValue, Schema};
use engine::{EngineBuilder, EngineError, Endpoints, Resource, Scope, ServiceIdentity};
use http::StatusCode;
use serde::Serialize;

const MAX_REPEAT: i64 = 16;

/// Register every demonstration route on `builder`.
///
/// # Errors
///
/// [`EngineError::DuplicateRoute`] if a route is already taken.
pub fn register(builder: &mut EngineBuilder, identity: &ServiceIdentity) -> Result<(), EngineError> {
    builder.route("GET", "/health", health(identity.clone()))?;
    builder.controller(&Resource::new(
        "/echo",
        Endpoints::new().get(echo_query).post(echo_body),
    ))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: ServiceIdentity,
}

/// Report liveness and the service identity.
pub fn health(identity: ServiceIdentity) -> impl Fn(&mut Scope) + Send + Sync + 'static {
    move |scope: &mut Scope| {
        scope.success_res(
            StatusCode::OK,
            Health {
                status: "ok",
                service: identity.clone(),
            },
        );
    }
}

/// Input accepted by both echo handlers.
#[derive(Debug, Default)]
struct Echo {
    message: String,
    repeat: i64,
    shout: bool,
}

impl Schema for Echo {
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("Message", "message", FieldKind::String).required(),
        FieldDescriptor::new("Repeat", "repeat", FieldKind::Integer),
        FieldDescriptor::new("Shout", "shout", FieldKind::Boolean),
    ];

    fn assign(&mut self, field: &str, value: FieldValue) {
        match (field, value) {
            ("Message", FieldValue::String(v)) => self.message = v,
            ("Repeat", FieldValue::Integer(v)) => self.repeat = v,
            ("Shout", FieldValue::Boolean(v)) => self.shout = v,
            _ => {}
        }
    }
}

#[derive(Debug, Serialize)]
struct Echoed {
    message: String,
}

impl Echo {
    fn render(&self) -> Echoed {
        let times = self.repeat.clamp(1, MAX_REPEAT) as usize;
        let mut message = vec![self.message.as_str(); times].join(" ");
        if self.shout {
            message = message.to_uppercase();
        }
        Echoed { message }
    }
}

fn reply(scope: &mut Scope, extracted: Result<Echo, Exception>) {
    match extracted {
        Ok(echo) => scope.success_res(StatusCode::OK, echo.render()),
        Err(ex) => scope.exception_res(StatusCode::BAD_REQUEST, &ex),
    }
}

/// `GET /echo?message=..&repeat=..&shout=..`
pub fn echo_query(scope: &mut Scope) {
    let mut echo = Echo::default();
    let extracted = scope.validate_query(&mut echo).map(|()| echo);
    reply(scope, extracted);
}

/// `POST /echo` with a JSON object body.
pub fn echo_body(scope: &mut Scope) {
    let mut echo = Echo::default();
    let extracted = scope.validate_json_body(&mut echo).map(|()| echo);
    reply(scope, extracted);
}
