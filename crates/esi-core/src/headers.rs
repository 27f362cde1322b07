//! Header selection for forwarded requests and returned responses.

use http::header::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};

/// Keyword that selects every header.
pub const ALL_HEADERS: &str = "all";

/// Which headers travel to a backend, or back from it.
///
/// `names` keeps the configured spelling; matching is case-insensitive.
/// When `all` is set the list is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HeaderSelection {
    /// Explicit header names, trimmed.
    pub names: Vec<String>,
    /// Select every header.
    pub all: bool,
}

impl HeaderSelection {
    /// Select every header.
    pub fn all() -> Self {
        Self {
            names: Vec::new(),
            all: true,
        }
    }

    /// Select the given header names.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    /// Parse a comma-separated list. An `all` entry anywhere selects every
    /// header and drops the names.
    pub fn parse(value: &str) -> Self {
        let mut selection = Self::default();
        for name in value.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if name.eq_ignore_ascii_case(ALL_HEADERS) {
                return Self::all();
            }
            selection.push(name);
        }
        selection
    }

    /// Combine with another selection. `all` on either side wins; otherwise
    /// names are appended, skipping ones already present.
    pub fn merge(&mut self, other: HeaderSelection) {
        self.all |= other.all;
        if self.all {
            self.names.clear();
            return;
        }
        for name in other.names {
            self.push(&name);
        }
    }

    fn push(&mut self, name: &str) {
        if !self.names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            self.names.push(name.to_string());
        }
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        !self.all && self.names.is_empty()
    }

    /// This selection, or `fallback` when this one selects nothing.
    pub fn or<'a>(&'a self, fallback: &'a HeaderSelection) -> &'a HeaderSelection {
        if self.is_empty() {
            fallback
        } else {
            self
        }
    }

    /// Whether a header name is selected.
    pub fn matches(&self, name: &str) -> bool {
        self.all || self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Copy the selected headers out of `headers`, keeping every value of
    /// multi-valued headers in their original order.
    pub fn select(&self, headers: &HeaderMap) -> HeaderMap {
        if self.all {
            return headers.clone();
        }

        let mut selected = HeaderMap::new();
        for name in &self.names {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            if selected.contains_key(&name) {
                continue;
            }
            for value in headers.get_all(&name) {
                selected.append(name.clone(), value.clone());
            }
        }
        selected
    }
}

impl From<String> for HeaderSelection {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<HeaderSelection> for String {
    fn from(selection: HeaderSelection) -> Self {
        if selection.all {
            ALL_HEADERS.to_string()
        } else {
            selection.names.join(", ")
        }
    }
}

/// Headers to send to a backend for a directive.
pub fn select_forward(request_headers: &HeaderMap, selection: &HeaderSelection) -> HeaderMap {
    selection.select(request_headers)
}

/// Headers from a backend response to hand back to the client.
pub fn select_return(response_headers: &HeaderMap, selection: &HeaderSelection) -> HeaderMap {
    selection.select(response_headers)
}
