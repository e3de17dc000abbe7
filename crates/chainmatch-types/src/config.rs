//! Configuration for the matching core.

use serde::{Deserialize, Serialize};

/// Log verbosity for the book's tracing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Whether debug-level output is enabled.
    #[must_use]
    pub fn debug_enabled(self) -> bool {
        self == Self::Debug
    }
}

/// Matching-engine configuration, hot-reloadable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Log level applied to the book's trace output.
    pub level: LogLevel,
    /// When set, dump every price level after each removal (debug aid,
    /// very noisy).
    pub log_price_levels: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_price_levels: false,
        }
    }
}
