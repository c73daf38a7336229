//! Common types shared across `fwork` crates: the error value and the JSON
//! response shapes.

pub mod error;
pub mod protocol;

pub use error::{Exception, ExceptionBuilder, Violation};
