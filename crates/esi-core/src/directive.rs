//! Include directives and their tag parser.
//!
//! A raw tag is the text between `<esi:` and the closing `/>`:
//!
//! ```text
//! include src="https://micro.service/checkout/cart" src="https://fallback/cart"
//!         timeout="9ms" ttl="30s" onerror="nocart.html"
//!         forwardheaders="Cookie, Accept-Language" returnheaders="all"
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::duration::parse_duration;
use crate::error::ParseError;
use crate::headers::HeaderSelection;

/// Keyword of the only supported directive.
pub const INCLUDE_KEYWORD: &str = "include";

/// One URL alternative of a directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Resource {
    /// URL to fetch.
    pub url: String,
}

impl Resource {
    /// Create a resource for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Scheme of the URL, lowercased, if it has one.
    pub fn scheme(&self) -> Option<String> {
        self.url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .filter(|scheme| !scheme.is_empty())
    }
}

/// A key looked up in a key-value backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceKey {
    /// The key.
    pub key: String,
}

/// A parsed include directive.
///
/// Immutable once parsed. Either `resources` or `resource_key` names what to
/// fetch; a directive with neither is valid and resolves to its fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// The raw tag bytes this directive was parsed from.
    #[serde(skip)]
    pub raw_tag: Vec<u8>,
    /// Ordered failover list.
    pub resources: Vec<Resource>,
    /// Key-value lookup, used instead of `resources`.
    pub resource_key: ResourceKey,
    /// Bound on a single backend attempt; zero means scope default.
    #[serde(with = "crate::duration::serde_literal")]
    pub timeout: Duration,
    /// Cache lifetime of the fragment; zero means scope default.
    #[serde(with = "crate::duration::serde_literal")]
    pub ttl: Duration,
    /// Fallback reference, either literal text or a file name.
    pub on_error: String,
    /// Request headers forwarded to the backend.
    pub forward_headers: HeaderSelection,
    /// Backend response headers returned to the client.
    pub return_headers: HeaderSelection,
}

impl Directive {
    /// Parse a raw tag.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Result<Self, ParseError> {
        let raw_tag = raw.into();
        let mut directive = Directive::default();
        directive.parse_attributes(&raw_tag)?;
        directive.raw_tag = raw_tag;
        Ok(directive)
    }

    /// Whether the directive names anything to fetch.
    pub fn has_resource(&self) -> bool {
        !self.resources.is_empty() || !self.resource_key.key.is_empty()
    }

    /// The key to look up, if this is a key directive.
    pub fn key(&self) -> Option<&str> {
        if self.resource_key.key.is_empty() {
            None
        } else {
            Some(&self.resource_key.key)
        }
    }

    /// The raw tag as text, for diagnostics.
    pub fn raw_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.raw_tag)
    }

    fn parse_attributes(&mut self, raw: &[u8]) -> Result<(), ParseError> {
        let raw = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;
        let mut lexer = Lexer::new(raw);

        let keyword = lexer.word();
        if keyword != INCLUDE_KEYWORD {
            return Err(ParseError::UnsupportedDirective(keyword.to_string()));
        }

        while let Some((name, value)) = lexer.attribute()? {
            self.apply(name, value)?;
        }
        Ok(())
    }

    fn apply(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        match name.to_ascii_lowercase().as_str() {
            "src" => {
                if !value.is_empty() {
                    self.resources.push(Resource::new(value));
                }
            }
            "key" => self.resource_key.key = value.to_string(),
            "timeout" => self.timeout = parse_attribute_duration("timeout", value)?,
            "ttl" => self.ttl = parse_attribute_duration("ttl", value)?,
            "onerror" => self.on_error = value.to_string(),
            "forwardheaders" => self.forward_headers.merge(HeaderSelection::parse(value)),
            "returnheaders" => self.return_headers.merge(HeaderSelection::parse(value)),
            _ => {}
        }
        Ok(())
    }
}

fn parse_attribute_duration(attribute: &'static str, value: &str) -> Result<Duration, ParseError> {
    parse_duration(value).map_err(|source| ParseError::InvalidDuration {
        attribute,
        value: value.to_string(),
        source,
    })
}

/// Splits a raw tag into a keyword and `name="value"` pairs.
struct Lexer<'a> {
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn word(&mut self) -> &'a str {
        self.skip_whitespace();
        let end = self
            .rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        word
    }

    fn attribute(&mut self) -> Result<Option<(&'a str, &'a str)>, ParseError> {
        self.skip_whitespace();
        // A trailing slash of a self-closing tag is not an attribute.
        if self.rest.is_empty() || self.rest == "/" {
            return Ok(None);
        }

        let name = self.word();
        self.skip_whitespace();
        let Some(rest) = self.rest.strip_prefix('=') else {
            return Err(ParseError::MissingEquals(name.to_string()));
        };
        let rest = rest.trim_start();
        let Some(rest) = rest.strip_prefix('"') else {
            return Err(ParseError::MissingQuote(name.to_string()));
        };
        let Some(end) = rest.find('"') else {
            return Err(ParseError::UnterminatedValue(name.to_string()));
        };

        let value = &rest[..end];
        self.rest = &rest[end + 1..];
        Ok(Some((name, value)))
    }
}
