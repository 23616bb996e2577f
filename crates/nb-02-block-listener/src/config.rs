//! Listener configuration

use std::collections::HashSet;
use std::time::Duration;

/// Filters applied before a block is measured.
#[derive(Clone, Debug, Default)]
pub struct ListenerConfig {
    /// Blocks announced within this window after start are ignored.
    pub warmup: Duration,

    /// Block hashes (lowercase hex, display order) that are never measured.
    /// Filled through [`ListenerConfig::ignore`].
    pub(crate) ignored_hashes: HashSet<String>,
}

impl ListenerConfig {
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn is_ignored(&self, hash_hex: &str) -> bool {
        self.ignored_hashes.contains(&hash_hex.to_ascii_lowercase())
    }

    /// Add hashes to the ignore set, normalising case.
    pub fn ignore<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored_hashes
            .extend(hashes.into_iter().map(|h| h.as_ref().to_ascii_lowercase()));
        self
    }
}
