use chrono::{DateTime, Utc};

/// Outcome of a refresh cycle that reached the commit phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Listing pages requested, including the terminating empty or failed one.
    pub pages_fetched: u32,
    /// `true` when listing stopped on an upstream error instead of an empty page.
    pub listing_truncated: bool,
    pub vendors_listed: u64,
    pub detail_passes: u32,
    pub details_fetched: u64,
    pub detail_failures: u64,
    /// Vendors that still had no details when the pass cap was reached.
    pub vendors_missing_details: u64,
    pub vendors_committed: u64,
    pub vendors_pruned: u64,
}

impl RefreshReport {
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
