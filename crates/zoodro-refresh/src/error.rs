use thiserror::Error;
use zoodro_db::DbError;
use zoodro_scraper::ScraperError;

/// Failure that aborts a whole refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("vendor store error: {0}")]
    Store(#[from] DbError),

    /// No vendor was enriched, so committing would prune the live collection
    /// down to nothing.
    #[error("refresh produced no enriched vendors; live collection left untouched")]
    EmptyCycle,

    #[error("a refresh cycle is already running")]
    AlreadyRunning,
}

/// Why one vendor's detail could not be attached during enrichment.
///
/// Never aborts a cycle; the vendor stays "missing details" and is retried
/// on the next pass.
#[derive(Debug, Error)]
pub enum DetailFetchError {
    #[error("upstream detail fetch failed for vendor {vendor_id}: {source}")]
    Upstream {
        vendor_id: i64,
        #[source]
        source: ScraperError,
    },

    #[error("storing details failed for vendor {vendor_id}: {source}")]
    Store {
        vendor_id: i64,
        #[source]
        source: DbError,
    },

    #[error("vendor {vendor_id} disappeared from staging before its details were stored")]
    Vanished { vendor_id: i64 },
}

impl DetailFetchError {
    #[must_use]
    pub fn vendor_id(&self) -> i64 {
        match self {
            DetailFetchError::Upstream { vendor_id, .. }
            | DetailFetchError::Store { vendor_id, .. }
            | DetailFetchError::Vanished { vendor_id } => *vendor_id,
        }
    }
}
