//! Cache signatures.

use std::hash::{Hash, Hasher};

use esi_core::Directive;
use http::HeaderMap;

/// Deterministic key of one directive resolution.
///
/// Built from the scope, the resource identity (URL list or key) and every
/// forwarded header. Equality compares the components, not just the hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Hex digest of the components.
    key: String,
    /// Components that make up the key (for debugging).
    components: Vec<String>,
}

impl Signature {
    /// Compute the signature of `directive` resolved in `scope` with `forwarded` headers.
    pub fn compute(scope: &str, directive: &Directive, forwarded: &HeaderMap) -> Self {
        let mut components = vec![format!("scope:{}", scope)];

        if let Some(key) = directive.key() {
            components.push(format!("key:{}", key));
        }
        for resource in &directive.resources {
            components.push(format!("src:{}", resource.url));
        }

        let mut headers: Vec<(&str, String)> = forwarded
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // Stable sort keeps the value order of multi-valued headers.
        headers.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in headers {
            components.push(format!("h:{}={}", name, value));
        }

        Self::from_components(components)
    }

    /// Build a signature from raw components.
    pub fn from_components(components: Vec<String>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        components.hash(&mut hasher);
        Self {
            key: format!("{:016x}", hasher.finish()),
            components,
        }
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Get the key components (for debugging).
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn cart() -> Directive {
        Directive::parse(r#"include src="https://a/cart" src="https://b/cart""#).unwrap()
    }

    fn cookie(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_deterministic() {
        let a = Signature::compute("/", &cart(), &cookie("a=1"));
        let b = Signature::compute("/", &cart(), &cookie("a=1"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_header_values_distinguish() {
        let a = Signature::compute("/", &cart(), &cookie("a=1"));
        let b = Signature::compute("/", &cart(), &cookie("a=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_scope_distinguishes() {
        let a = Signature::compute("/catalog", &cart(), &HeaderMap::new());
        let b = Signature::compute("/checkout", &cart(), &HeaderMap::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_vs_url() {
        let key = Directive::parse(r#"include key="https://a/cart""#).unwrap();
        let url = Directive::parse(r#"include src="https://a/cart""#).unwrap();
        assert_ne!(
            Signature::compute("/", &key, &HeaderMap::new()),
            Signature::compute("/", &url, &HeaderMap::new())
        );
    }

    #[test]
    fn test_header_insertion_order_irrelevant() {
        let mut a = HeaderMap::new();
        a.insert("cookie", HeaderValue::from_static("a=1"));
        a.insert("accept-language", HeaderValue::from_static("de"));
        let mut b = HeaderMap::new();
        b.insert("accept-language", HeaderValue::from_static("de"));
        b.insert("cookie", HeaderValue::from_static("a=1"));
        assert_eq!(
            Signature::compute("/", &cart(), &a),
            Signature::compute("/", &cart(), &b)
        );
    }

    #[test]
    fn test_components() {
        let sig = Signature::compute("/", &cart(), &cookie("a=1"));
        assert_eq!(
            sig.components(),
            &["scope:/", "src:https://a/cart", "src:https://b/cart", "h:cookie=a=1"]
        );
    }
}
