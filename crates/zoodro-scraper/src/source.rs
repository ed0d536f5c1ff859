use async_trait::async_trait;
use zoodro_core::{VendorDetail, VendorSummary};

use crate::ScraperError;

/// Where the refresh pipeline gets vendors from.
///
/// [`crate::VendorApiClient`] is the production implementation; tests supply
/// scripted fakes.
#[async_trait]
pub trait VendorSource: Send + Sync {
    /// Fetches one listing page. An empty result marks the end of pagination.
    async fn list_page(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<VendorSummary>, ScraperError>;

    /// Fetches the detail payload for one vendor.
    async fn fetch_detail(&self, vendor_id: i64) -> Result<VendorDetail, ScraperError>;
}
