//! Exact-match routing from `(method, path)` to a [`Handler`].

pub mod handler;
pub mod key;
pub mod registry;
pub mod resource;

pub use handler::{Handler, NotFound};
pub use key::EndpointKey;
pub use registry::{Router, RouterBuilder};
pub use resource::{Controller, Endpoints, Resource};
