//! Page assembly metrics.

use serde::{Deserialize, Serialize};

/// How one include ended up in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentOutcome {
    /// Served from the cache.
    Cached,
    /// Fetched from a backend.
    Fetched,
    /// Replaced by fallback content.
    Fallback,
    /// Replaced by nothing.
    Empty,
    /// The tag could not be parsed.
    Invalid,
}

impl std::fmt::Display for FragmentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached => write!(f, "CACHED"),
            Self::Fetched => write!(f, "FETCHED"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Metrics for a single include.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentMetrics {
    /// Position of the tag in the page.
    pub index: usize,
    /// The URL or key that produced the content, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub outcome: FragmentOutcome,
    /// Resolution duration (microseconds).
    pub duration_us: u64,
    /// Bytes spliced into the page.
    pub bytes: usize,
}

/// Metrics for one assembled page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Scope the page was assembled under.
    pub scope: String,
    /// Page identifier from the scope's `page_id_source`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page_id: String,
    /// Total assembly duration (microseconds).
    pub total_duration_us: u64,
    /// One entry per include, in document order.
    pub fragments: Vec<FragmentMetrics>,
}

impl PageMetrics {
    /// Number of includes with the given outcome.
    pub fn count(&self, outcome: FragmentOutcome) -> usize {
        self.fragments
            .iter()
            .filter(|f| f.outcome == outcome)
            .count()
    }

    /// Format as JSON (pretty printed).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let page = if self.page_id.is_empty() {
            String::new()
        } else {
            format!(" page {}", self.page_id)
        };
        let mut lines = vec![format!(
            "Scope {}{}: {} fragments in {}us ({:.2}ms)",
            self.scope,
            page,
            self.fragments.len(),
            self.total_duration_us,
            self.total_duration_us as f64 / 1000.0
        )];
        for fragment in &self.fragments {
            lines.push(format!(
                "  #{} [{}] {}us, {} bytes{}",
                fragment.index,
                fragment.outcome,
                fragment.duration_us,
                fragment.bytes,
                fragment
                    .resource
                    .as_deref()
                    .map(|r| format!(" - {}", r))
                    .unwrap_or_default()
            ));
        }
        lines.join("\n")
    }
}
