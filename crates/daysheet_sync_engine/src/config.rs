//! Sync engine configuration.

use std::time::Duration;

/// Tuning knobs for the debounced scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last edit before the job fires.
    pub debounce: Duration,
    /// Margin subtracted from the debounce when checking for recent edits at
    /// fire time. An edit younger than `debounce - edit_margin` defers the
    /// run and re-arms the timer.
    pub edit_margin: Duration,
    /// Maximum bytes of captured stdout/stderr retained per run in logs.
    pub output_log_limit: usize,
}

impl SyncConfig {
    /// Creates the default configuration: 10 second debounce with a 500
    /// millisecond edit margin.
    pub fn new() -> Self {
        Self {
            debounce: Duration::from_secs(10),
            edit_margin: Duration::from_millis(500),
            output_log_limit: 4000,
        }
    }

    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the recent-edit margin.
    pub fn with_edit_margin(mut self, margin: Duration) -> Self {
        self.edit_margin = margin;
        self
    }

    /// Sets the captured-output log limit.
    pub fn with_output_log_limit(mut self, limit: usize) -> Self {
        self.output_log_limit = limit;
        self
    }

    /// Debounce window in milliseconds.
    pub(crate) fn debounce_ms(&self) -> u64 {
        self.debounce.as_millis() as u64
    }

    /// The age below which an edit counts as "recent" at fire time.
    pub(crate) fn recent_edit_ms(&self) -> u64 {
        self.debounce_ms()
            .saturating_sub(self.edit_margin.as_millis() as u64)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce_ms(), 10_000);
        assert_eq!(config.recent_edit_ms(), 9_500);
    }

    #[test]
    fn margin_never_underflows() {
        let config = SyncConfig::new()
            .with_debounce(Duration::from_millis(100))
            .with_edit_margin(Duration::from_millis(500));
        assert_eq!(config.recent_edit_ms(), 0);
    }
}
