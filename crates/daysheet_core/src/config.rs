//! Configuration for the sheet store.

use std::collections::BTreeSet;

/// Configuration for a [`crate::SheetStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Site classes whose memo edits are never queued for external sync.
    pub excluded_sites: BTreeSet<String>,
    /// Maximum number of tasks returned by `recent_tasks` callers by default.
    pub recent_task_limit: usize,
}

impl StoreConfig {
    /// Creates a configuration with no excluded sites.
    pub fn new() -> Self {
        Self {
            excluded_sites: BTreeSet::new(),
            recent_task_limit: 200,
        }
    }

    /// Adds a site class excluded from sync-task queueing.
    pub fn with_excluded_site(mut self, site: impl Into<String>) -> Self {
        self.excluded_sites.insert(site.into());
        self
    }

    /// Sets the default recent-task listing limit.
    pub fn with_recent_task_limit(mut self, limit: usize) -> Self {
        self.recent_task_limit = limit;
        self
    }

    /// Returns true if memo edits to the given site must not enqueue tasks.
    pub fn is_excluded(&self, site: &str) -> bool {
        self.excluded_sites.contains(site)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_excluded_sites() {
        let config = StoreConfig::new()
            .with_excluded_site("E10")
            .with_excluded_site("E11");
        assert!(config.is_excluded("E10"));
        assert!(config.is_excluded("E11"));
        assert!(!config.is_excluded("A1"));
    }
}
