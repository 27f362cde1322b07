//! Page identifiers derived from request data.
//!
//! A scope's `page_id_source` lists what identifies a page:
//! `path`, `host`, `ip`, `header-<Name>` and `cookie-<name>`. Keywords match
//! case-insensitively; header and cookie names keep their spelling.

use std::hash::{Hash, Hasher};

use http::header::{HeaderMap, COOKIE, HOST};

/// One input to a page identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageIdSource {
    Path,
    Host,
    /// First `X-Forwarded-For` hop, else `X-Real-IP`.
    Ip,
    Header(String),
    Cookie(String),
}

impl PageIdSource {
    /// Parse one entry. Unknown keywords and empty names give `None`.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.eq_ignore_ascii_case("path") {
            return Some(Self::Path);
        }
        if entry.eq_ignore_ascii_case("host") {
            return Some(Self::Host);
        }
        if entry.eq_ignore_ascii_case("ip") {
            return Some(Self::Ip);
        }
        if let Some(name) = strip_prefix_ignore_case(entry, "header-") {
            return (!name.is_empty()).then(|| Self::Header(name.to_string()));
        }
        if let Some(name) = strip_prefix_ignore_case(entry, "cookie-") {
            return (!name.is_empty()).then(|| Self::Cookie(name.to_string()));
        }
        None
    }

    /// The value this source contributes for a request.
    pub fn extract(&self, path: &str, headers: &HeaderMap) -> String {
        match self {
            Self::Path => path.to_string(),
            Self::Host => header_text(headers, HOST.as_str()),
            Self::Ip => {
                let forwarded = header_text(headers, "x-forwarded-for");
                match forwarded.split(',').next().map(str::trim) {
                    Some(hop) if !hop.is_empty() => hop.to_string(),
                    _ => header_text(headers, "x-real-ip"),
                }
            }
            Self::Header(name) => header_text(headers, name),
            Self::Cookie(name) => headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(';'))
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Hex identifier of a page. With no sources the path alone identifies it.
pub fn page_id(sources: &[PageIdSource], path: &str, headers: &HeaderMap) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    if sources.is_empty() {
        PageIdSource::Path.extract(path, headers).hash(&mut hasher);
    }
    for source in sources {
        source.extract(path, headers).hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &value[prefix.len()..])
}

fn header_text(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
}
