//! Request dispatch and the HTTPS listener that drives it.

pub mod engine;
pub mod listener;

pub use engine::{Engine, EngineBuilder, MAX_BODY_BYTES};
pub use listener::Server;
