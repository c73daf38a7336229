//! Canonical endpoint keys.

use std::fmt;

/// Joins the method and path inside a key.
pub const SEPARATOR: char = '-';

/// Exact-match lookup key: `lowercase(method) + "-" + lowercase(path)`.
///
/// No other normalisation happens. Trailing slashes are significant, there
/// are no path parameters, and the query string never takes part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn new(method: &str, path: &str) -> Self {
        let mut key = String::with_capacity(method.len() + path.len() + 1);
        key.push_str(method);
        key.push(SEPARATOR);
        key.push_str(path);
        Self(key.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<(&http::Method, &str)> for EndpointKey {
    fn from((method, path): (&http::Method, &str)) -> Self {
        Self::new(method.as_str(), path)
    }
}
