//! Optional configuration sections and their defaults.

use serde::{Deserialize, Serialize};

// ============================================================================
// watch
// ============================================================================

/// `watch` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    /// Extra paths or glob-like patterns (relative to the project root) that
    /// static import analysis cannot see, e.g. `"styles/**/*.css"`.
    pub extra: Vec<String>,
    /// Quiet period before a burst of changes becomes a batch.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extra: Vec::new(),
            debounce_ms: 300,
        }
    }
}

// ============================================================================
// format
// ============================================================================

/// `format` section: indentation of rendered markup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatConfig {
    pub enabled: bool,
    /// Fail the task instead of warning when markup cannot be formatted.
    pub required: bool,
    pub indent: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required: false,
            indent: 2,
        }
    }
}

// ============================================================================
// concurrency
// ============================================================================

/// Upper bound on simultaneously running render workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// One worker per available CPU.
    #[default]
    Automatic,
    Fixed(usize),
}

impl Concurrency {
    pub fn limit(self) -> usize {
        match self {
            Self::Fixed(n) => n.max(1),
            Self::Automatic => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConcurrencyRepr {
    Fixed(usize),
    Named(String),
}

impl TryFrom<ConcurrencyRepr> for Concurrency {
    type Error = String;

    fn try_from(repr: ConcurrencyRepr) -> Result<Self, Self::Error> {
        match repr {
            ConcurrencyRepr::Fixed(0) => Err("concurrency must be at least 1".into()),
            ConcurrencyRepr::Fixed(n) => Ok(Self::Fixed(n)),
            ConcurrencyRepr::Named(s) if s == "automatic" => Ok(Self::Automatic),
            ConcurrencyRepr::Named(s) => Err(format!(
                "concurrency must be an integer or \"automatic\", got \"{s}\""
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Concurrency {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ConcurrencyRepr::deserialize(deserializer)?;
        Self::try_from(repr).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Concurrency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Automatic => serializer.serialize_str("automatic"),
            Self::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

// ============================================================================
// merge
// ============================================================================

/// Identifier of the template-merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Replace the inner content of the target element.
    #[default]
    Replace,
    /// Insert after the existing children of the target element.
    Append,
    /// Insert before the existing children of the target element.
    Prepend,
}
