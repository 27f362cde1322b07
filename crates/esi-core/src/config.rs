//! Scope configuration.
//!
//! A config file lists one `[[scopes]]` table per path prefix:
//!
//! ```toml
//! [[scopes]]
//! scope = "/catalog"
//! timeout = "122ms"
//! ttl = "30s"
//! on_error = "testdata/on_error.txt"
//! forward_headers = "Cookie, Accept-Language"
//! caches = ["memory://"]
//!
//! [scopes.backends]
//! backend = "memory://"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::headers::HeaderSelection;
use crate::on_error::OnError;
use crate::page_id::PageIdSource;

/// Timeout of one backend attempt when neither the directive nor the scope sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Backend used for `key=` directives unless the scope names another.
pub const DEFAULT_KEY_BACKEND: &str = "backend";

/// Directives resolved at once per page unless the scope says otherwise.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusCodesForm {
    One(u16),
    Many(Vec<u16>),
    Text(String),
}

/// Status codes as a list, a single number or a comma string.
/// Entries of a string that are not numbers are skipped.
fn status_codes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u16>, D::Error> {
    Ok(match StatusCodesForm::deserialize(deserializer)? {
        StatusCodesForm::One(code) => vec![code],
        StatusCodesForm::Many(codes) => codes,
        StatusCodesForm::Text(text) => text
            .split(',')
            .filter_map(|entry| entry.trim().parse().ok())
            .collect(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringListForm {
    Many(Vec<String>),
    Text(String),
}

/// Trimmed entries from a list or a comma string, case preserved.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let entries = match StringListForm::deserialize(deserializer)? {
        StringListForm::Many(items) => items,
        StringListForm::Text(text) => text.split(',').map(str::to_string).collect(),
    };
    Ok(entries
        .iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

/// Settings for every request under one path prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Path prefix, starting with `/`.
    pub scope: String,
    /// Default bound on a single backend attempt.
    #[serde(with = "crate::duration::serde_literal")]
    pub timeout: Duration,
    /// Default cache lifetime; zero disables caching.
    #[serde(with = "crate::duration::serde_literal")]
    pub ttl: Duration,
    /// Status codes counted as success. Empty means any 2xx.
    #[serde(deserialize_with = "status_codes")]
    pub allowed_status_codes: Vec<u16>,
    /// Request methods that get assembled.
    pub allowed_methods: Vec<String>,
    /// Default fallback, literal text or a file relative to the config file.
    pub on_error: String,
    /// Resolved `on_error` content.
    #[serde(skip)]
    pub on_error_content: Bytes,
    /// Default forwarded headers.
    pub forward_headers: HeaderSelection,
    /// Default returned headers.
    pub return_headers: HeaderSelection,
    /// Backend name to URL.
    pub backends: BTreeMap<String, String>,
    /// Cache store URLs.
    pub caches: Vec<String>,
    /// Backend used for `key=` directives.
    pub key_backend: String,
    /// Directives resolved at once per page.
    pub max_concurrency: usize,
    /// Keep the raw tag when a directive cannot be parsed or falls back to nothing.
    pub keep_failed_tags: bool,
    /// Log destination: a path, `stdout` or `stderr`. Empty disables logging.
    pub log_file: String,
    /// Log level. Empty disables logging.
    pub log_level: String,
    /// What identifies a page: `path`, `host`, `ip`, `header-<Name>`, `cookie-<name>`.
    #[serde(deserialize_with = "string_list")]
    pub page_id_source: Vec<String>,
    /// Parsed `page_id_source`.
    #[serde(skip)]
    pub page_id_sources: Vec<PageIdSource>,
    /// Directory `on_error` files are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            scope: "/".to_string(),
            timeout: DEFAULT_TIMEOUT,
            ttl: Duration::ZERO,
            allowed_status_codes: Vec::new(),
            allowed_methods: default_methods(),
            on_error: String::new(),
            on_error_content: Bytes::new(),
            forward_headers: HeaderSelection::default(),
            return_headers: HeaderSelection::default(),
            backends: BTreeMap::new(),
            caches: Vec::new(),
            key_backend: DEFAULT_KEY_BACKEND.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            keep_failed_tags: false,
            log_file: String::new(),
            log_level: String::new(),
            page_id_source: Vec::new(),
            page_id_sources: Vec::new(),
            base_dir: PathBuf::new(),
        }
    }
}

impl ScopeConfig {
    /// Create a scope with default settings.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Default::default()
        }
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set literal fallback content.
    pub fn with_on_error(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.on_error_content = Bytes::from(content.clone());
        self.on_error = content;
        self
    }

    /// Restrict successful status codes.
    pub fn with_allowed_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.allowed_status_codes = codes.into_iter().collect();
        self
    }

    /// Add a named backend URL.
    pub fn with_backend(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.backends.insert(name.into(), url.into());
        self
    }

    /// Add a cache store URL.
    pub fn with_cache(mut self, url: impl Into<String>) -> Self {
        self.caches.push(url.into());
        self
    }

    /// Set default forwarded headers.
    pub fn with_forward_headers(mut self, selection: HeaderSelection) -> Self {
        self.forward_headers = selection;
        self
    }

    /// Set default returned headers.
    pub fn with_return_headers(mut self, selection: HeaderSelection) -> Self {
        self.return_headers = selection;
        self
    }

    /// Set the per-page concurrency bound.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set what identifies a page.
    pub fn with_page_id_source<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_id_source = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Keep raw tags that could not be resolved.
    pub fn with_keep_failed_tags(mut self, keep: bool) -> Self {
        self.keep_failed_tags = keep;
        self
    }

    /// Validate and normalize the scope, loading `on_error` relative to `base_dir`.
    pub fn resolve(&mut self, base_dir: &Path) -> Result<(), ConfigError> {
        if !self.scope.starts_with('/') {
            return Err(ConfigError::InvalidScope {
                scope: self.scope.clone(),
                reason: "must start with '/'".to_string(),
            });
        }

        self.allowed_methods = self
            .allowed_methods
            .iter()
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        if self.allowed_methods.is_empty() {
            self.allowed_methods = default_methods();
        }

        self.page_id_sources = self
            .page_id_source
            .iter()
            .map(|entry| {
                PageIdSource::parse(entry).ok_or_else(|| ConfigError::InvalidScope {
                    scope: self.scope.clone(),
                    reason: format!("unknown page_id_source {:?}", entry),
                })
            })
            .collect::<Result<_, _>>()?;

        self.log_level = self.log_level.trim().to_ascii_lowercase();
        self.log_file = self.log_file.trim().to_string();
        self.base_dir = base_dir.to_path_buf();
        self.on_error_content = OnError::parse(&self.on_error).load(base_dir)?;
        Ok(())
    }

    /// Whether a backend status counts as success.
    pub fn status_allowed(&self, status: u16) -> bool {
        if self.allowed_status_codes.is_empty() {
            (200..300).contains(&status)
        } else {
            self.allowed_status_codes.contains(&status)
        }
    }

    /// Whether requests with this method are assembled.
    pub fn method_allowed(&self, method: &str) -> bool {
        self.allowed_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Timeout for one attempt of a directive.
    pub fn effective_timeout(&self, directive_timeout: Duration) -> Duration {
        if directive_timeout.is_zero() {
            self.timeout
        } else {
            directive_timeout
        }
    }

    /// Cache lifetime for a directive. Zero means do not cache.
    pub fn effective_ttl(&self, directive_ttl: Duration) -> Duration {
        if directive_ttl.is_zero() {
            self.ttl
        } else {
            directive_ttl
        }
    }

    /// Identifier of the page a request is for.
    pub fn page_id(&self, path: &str, headers: &http::HeaderMap) -> String {
        crate::page_id::page_id(&self.page_id_sources, path, headers)
    }

    /// Whether a request path falls under this scope.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.scope)
    }
}

/// All configured scopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EsiConfig {
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl EsiConfig {
    /// Load from a file. `.json` files are JSON, anything else is TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let mut config: EsiConfig = if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Format {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Format {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve(base_dir)?;
        tracing::debug!(
            path = %path.display(),
            scopes = config.scopes.len(),
            "loaded esi config"
        );
        Ok(config)
    }

    /// Parse TOML text and resolve it against `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: EsiConfig = toml::from_str(content).map_err(|e| ConfigError::Format {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.resolve(base_dir)?;
        Ok(config)
    }

    /// Validate every scope. An empty config gets one default scope for `/`.
    pub fn resolve(&mut self, base_dir: &Path) -> Result<(), ConfigError> {
        if self.scopes.is_empty() {
            self.scopes.push(ScopeConfig::default());
        }
        for scope in &mut self.scopes {
            scope.resolve(base_dir)?;
        }
        Ok(())
    }

    /// The scope with the longest prefix matching `path`.
    pub fn scope_for(&self, path: &str) -> Option<&ScopeConfig> {
        self.scopes
            .iter()
            .filter(|s| s.matches(path))
            .max_by_key(|s| s.scope.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let scope = ScopeConfig::default();
        assert_eq!(scope.scope, "/");
        assert_eq!(scope.timeout, Duration::from_secs(20));
        assert_eq!(scope.ttl, Duration::ZERO);
        assert_eq!(scope.allowed_methods, vec!["GET"]);
        assert_eq!(scope.key_backend, "backend");
        assert_eq!(scope.max_concurrency, 8);
        assert!(!scope.keep_failed_tags);
    }

    #[test]
    fn test_toml_scope() {
        let dir = tempfile::tempdir().unwrap();
        let config = EsiConfig::from_toml_str(
            r#"
            [[scopes]]
            scope = "/catalog"
            timeout = "122ms"
            ttl = "30s"
            allowed_status_codes = [200, 404]
            allowed_methods = [" post ", "get"]
            on_error = "Resource content unavailable"
            forward_headers = "Cookie, Accept-Language"
            return_headers = " ALL "
            caches = ["memory://"]
            log_level = "DEBUG"

            [scopes.backends]
            backend = "memory://"
            "#,
            dir.path(),
        )
        .unwrap();

        let scope = &config.scopes[0];
        assert_eq!(scope.scope, "/catalog");
        assert_eq!(scope.timeout, Duration::from_millis(122));
        assert_eq!(scope.ttl, Duration::from_secs(30));
        assert_eq!(scope.allowed_methods, vec!["POST", "GET"]);
        assert_eq!(&scope.on_error_content[..], b"Resource content unavailable");
        assert_eq!(scope.forward_headers.names, vec!["Cookie", "Accept-Language"]);
        assert!(scope.return_headers.all);
        assert_eq!(scope.backends["backend"], "memory://");
        assert_eq!(scope.log_level, "debug");
        assert!(scope.status_allowed(404));
        assert!(!scope.status_allowed(201));
    }

    #[test]
    fn test_load_json_with_on_error_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("testdata")).unwrap();
        std::fs::write(
            dir.path().join("testdata/on_error.txt"),
            "Output on a backend connection error\n",
        )
        .unwrap();
        let path = dir.path().join("esi.json");
        std::fs::write(
            &path,
            r#"{"scopes": [{"scope": "/", "on_error": "testdata/on_error.txt"}]}"#,
        )
        .unwrap();

        let config = EsiConfig::load(&path).unwrap();
        assert_eq!(
            &config.scopes[0].on_error_content[..],
            b"Output on a backend connection error\n"
        );
        assert_eq!(config.scopes[0].base_dir, dir.path());
    }

    #[test]
    fn test_missing_on_error_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = EsiConfig::from_toml_str(
            "[[scopes]]\non_error = \"testdataXX/on_error.txt\"\n",
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OnErrorFile { .. }));
    }

    #[test]
    fn test_invalid_scope() {
        let err = EsiConfig::from_toml_str("[[scopes]]\nscope = \"catalog\"\n", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScope { .. }));
    }

    #[test]
    fn test_bad_duration_is_format_error() {
        let err = EsiConfig::from_toml_str("[[scopes]]\ntimeout = \"9a\"\n", Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("unknown unit a in duration 9a"), "{}", err);
    }

    #[test]
    fn test_empty_config_gets_root_scope() {
        let config = EsiConfig::from_toml_str("", Path::new(".")).unwrap();
        assert_eq!(config.scopes.len(), 1);
        assert_eq!(config.scopes[0].scope, "/");
    }

    #[test]
    fn test_status_any_2xx_by_default() {
        let scope = ScopeConfig::default();
        assert!(scope.status_allowed(200));
        assert!(scope.status_allowed(204));
        assert!(!scope.status_allowed(301));
        assert!(!scope.status_allowed(500));
    }

    #[test]
    fn test_effective_timeout_and_ttl() {
        let scope = ScopeConfig::new("/")
            .with_timeout(Duration::from_secs(1))
            .with_ttl(Duration::from_secs(5));
        assert_eq!(scope.effective_timeout(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(
            scope.effective_timeout(Duration::from_millis(9)),
            Duration::from_millis(9)
        );
        assert_eq!(scope.effective_ttl(Duration::ZERO), Duration::from_secs(5));
        assert_eq!(scope.effective_ttl(Duration::from_secs(2)), Duration::from_secs(2));
    }

    #[test]
    fn test_scope_for_longest_prefix() {
        let mut config = EsiConfig {
            scopes: vec![
                ScopeConfig::new("/"),
                ScopeConfig::new("/catalog"),
                ScopeConfig::new("/catalog/product"),
            ],
        };
        config.resolve(Path::new(".")).unwrap();

        assert_eq!(config.scope_for("/catalog/product/1").unwrap().scope, "/catalog/product");
        assert_eq!(config.scope_for("/catalog").unwrap().scope, "/catalog");
        assert_eq!(config.scope_for("/checkout").unwrap().scope, "/");
    }

    #[test]
    fn test_allowed_status_code_forms() {
        let cases = [
            ("allowed_status_codes = 300", vec![300]),
            ("allowed_status_codes = [300, 200]", vec![300, 200]),
            ("allowed_status_codes = \"300,200\"", vec![300, 200]),
            ("allowed_status_codes = \" 300 , 200, 500 \"", vec![300, 200, 500]),
            ("allowed_status_codes = \"Hello\"", vec![]),
            ("allowed_status_codes = \"404, teapot, 418\"", vec![404, 418]),
        ];
        for (line, expected) in cases {
            let config =
                EsiConfig::from_toml_str(&format!("[[scopes]]\n{}\n", line), Path::new("."))
                    .unwrap();
            assert_eq!(config.scopes[0].allowed_status_codes, expected, "{}", line);
        }
    }

    #[test]
    fn test_allowed_status_codes_from_json_string() {
        let config: EsiConfig =
            serde_json::from_str(r#"{"scopes": [{"allowed_status_codes": "200, 206"}]}"#).unwrap();
        assert_eq!(config.scopes[0].allowed_status_codes, vec![200, 206]);
    }

    #[test]
    fn test_page_id_source() {
        let config = EsiConfig::from_toml_str(
            "[[scopes]]\npage_id_source = \"pAth,host , IP, header-X-GitHub-Request-Id, header-Server, cookie-__Host-user_session_same_site\"\n",
            Path::new("."),
        )
        .unwrap();
        let scope = &config.scopes[0];
        assert_eq!(
            scope.page_id_source,
            vec![
                "pAth",
                "host",
                "IP",
                "header-X-GitHub-Request-Id",
                "header-Server",
                "cookie-__Host-user_session_same_site",
            ]
        );
        assert_eq!(scope.page_id_sources.len(), 6);
        assert_eq!(scope.page_id_sources[2], PageIdSource::Ip);
        assert_eq!(
            scope.page_id_sources[3],
            PageIdSource::Header("X-GitHub-Request-Id".to_string())
        );
    }

    #[test]
    fn test_page_id_source_list_form() {
        let config = EsiConfig::from_toml_str(
            "[[scopes]]\npage_id_source = [\" path \", \"cookie-session\"]\n",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(config.scopes[0].page_id_source, vec!["path", "cookie-session"]);
    }

    #[test]
    fn test_unknown_page_id_source_is_rejected() {
        for value in ["query", "header-", "path, referer"] {
            let err = EsiConfig::from_toml_str(
                &format!("[[scopes]]\npage_id_source = \"{}\"\n", value),
                Path::new("."),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidScope { .. }), "{}", value);
        }
    }

    #[test]
    fn test_malformed_page_id_source_is_format_error() {
        let err = EsiConfig::from_toml_str(
            "[[scopes]]\npage_id_source = \"path, host\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Format { .. }));
    }

    #[test]
    fn test_page_id_depends_on_sources() {
        let mut scope = ScopeConfig::new("/").with_page_id_source(["path", "cookie-session"]);
        scope.resolve(Path::new(".")).unwrap();

        let mut a = http::HeaderMap::new();
        a.insert("cookie", http::HeaderValue::from_static("session=a"));
        let mut b = http::HeaderMap::new();
        b.insert("cookie", http::HeaderValue::from_static("session=b"));
        assert_ne!(scope.page_id("/cart", &a), scope.page_id("/cart", &b));
        assert_eq!(scope.page_id("/cart", &a), scope.page_id("/cart", &a));
    }

    #[test]
    fn test_method_allowed() {
        let scope = ScopeConfig::default();
        assert!(scope.method_allowed("GET"));
        assert!(scope.method_allowed("get"));
        assert!(!scope.method_allowed("POST"));
    }
}
