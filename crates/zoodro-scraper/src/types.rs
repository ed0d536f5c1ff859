//! Wire shapes of the upstream listing endpoint.
//!
//! `GetHomePageList` answers with a page layout rather than a flat list: a
//! `sections` array where only some sections carry vendor `items`. Banners
//! and carousels arrive as sections with `items` absent or `null`.

use serde::Deserialize;
use zoodro_core::VendorSummary;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorPageResponse {
    #[serde(default)]
    pub sections: Option<Vec<Section>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub items: Option<Vec<VendorSummary>>,
}

impl VendorPageResponse {
    /// Flattens every section's `items` in page order.
    #[must_use]
    pub fn into_vendors(self) -> Vec<VendorSummary> {
        self.sections
            .unwrap_or_default()
            .into_iter()
            .filter_map(|section| section.items)
            .flatten()
            .collect()
    }
}
