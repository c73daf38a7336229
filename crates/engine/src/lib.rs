//! `engine`: a TLS-terminating request-dispatch engine.
//!
//! An [`Engine`] is composed once with [`EngineBuilder`] (routes, controllers,
//! interceptor factories), frozen, and served over HTTPS by a [`Server`]
//! bound with a self-issued [`identity::Credential`]. Each request gets its
//! own [`Scope`] carrying request data, side-channel values and the buffered
//! JSON response.

pub mod error;
pub mod identity;
pub mod interceptor;
pub mod route;
pub mod scope;
pub mod server;
pub mod testing;

pub use error::EngineError;
pub use identity::{
    issue, CertificateProfile, CertificateSubject, Credential, PrivateKey, ServiceIdentity,
};
pub use interceptor::{Chain, Interceptor, InterceptorFactory, Measurement};
pub use route::{Controller, EndpointKey, Endpoints, Handler, NotFound, Resource, Router};
pub use scope::Scope;
pub use server::{Engine, EngineBuilder, Server};
