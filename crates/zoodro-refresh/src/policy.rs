use std::time::Duration;

use zoodro_core::AppConfig;

/// Pacing and sizing knobs for one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub list_page_size: u32,
    /// Vendors fetched concurrently per enrichment batch.
    pub detail_batch_size: usize,
    /// Upper bound on enrichment passes over vendors still missing details.
    pub detail_max_passes: u32,
    pub batch_delay: Duration,
    pub pass_delay: Duration,
    /// Documents copied into the live collection per write during commit.
    pub commit_chunk_size: usize,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            list_page_size: 20,
            detail_batch_size: 50,
            detail_max_passes: 15,
            batch_delay: Duration::from_millis(100),
            pass_delay: Duration::from_secs(1),
            commit_chunk_size: 200,
        }
    }
}

impl RefreshPolicy {
    /// Sizes of zero are bumped to one so a misconfigured policy still makes
    /// progress.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            list_page_size: config.refresh_page_size.max(1),
            detail_batch_size: config.refresh_batch_size.max(1),
            detail_max_passes: config.refresh_max_passes,
            batch_delay: Duration::from_millis(config.refresh_batch_delay_ms),
            pass_delay: Duration::from_millis(config.refresh_pass_delay_ms),
            commit_chunk_size: config.refresh_chunk_size.max(1),
        }
    }

    /// A policy with no sleeps, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            pass_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
