//! Request cookies.
//!
//! Cookies are deduplicated as a set where identity covers the whole
//! `(name, value, path, domain)` tuple, compared case-insensitively. Two
//! cookies that share a name but differ in value are distinct entries; adding
//! an equal tuple twice collapses to one.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// An immutable request cookie.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct RequestCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
}

impl RequestCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        path: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: path.into(),
            domain: domain.into(),
        }
    }
}

impl PartialEq for RequestCookie {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.value.eq_ignore_ascii_case(&other.value)
            && self.path.eq_ignore_ascii_case(&other.path)
            && self.domain.eq_ignore_ascii_case(&other.domain)
    }
}

impl Hash for RequestCookie {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
        self.value.to_ascii_lowercase().hash(state);
        self.path.to_ascii_lowercase().hash(state);
        self.domain.to_ascii_lowercase().hash(state);
    }
}

/// Render the `Cookie` request header value for a set of cookies.
///
/// Path and domain are scoping attributes and are not sent on the wire.
pub(crate) fn cookie_header(cookies: &[RequestCookie]) -> Option<String> {
    if cookies.is_empty() {
        None
    } else {
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
