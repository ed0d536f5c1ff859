//! The document-store seam shared by the staging and live vendor collections.

use async_trait::async_trait;
use zoodro_core::{BoundingBox, VendorDetail, VendorDocument};

use crate::DbError;

/// Which vendor collection a store instance is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCollection {
    /// Scratch collection a refresh cycle is assembled in.
    Staging,
    /// Collection served to read queries.
    Live,
}

impl VendorCollection {
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            VendorCollection::Staging => "staging_vendors",
            VendorCollection::Live => "vendors",
        }
    }
}

impl std::fmt::Display for VendorCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VendorCollection::Staging => write!(f, "staging"),
            VendorCollection::Live => write!(f, "live"),
        }
    }
}

/// Document selector understood by every [`VendorStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum VendorFilter {
    All,
    MissingDetails,
    HasDetails,
    Outdated,
    IdIn(Vec<i64>),
    WithinBounds(BoundingBox),
}

impl VendorFilter {
    /// In-process evaluation of the filter against a single document.
    #[must_use]
    pub fn matches(&self, doc: &VendorDocument) -> bool {
        match self {
            VendorFilter::All => true,
            VendorFilter::MissingDetails => !doc.has_details(),
            VendorFilter::HasDetails => doc.has_details(),
            VendorFilter::Outdated => doc.outdated == Some(true),
            VendorFilter::IdIn(ids) => ids.contains(&doc.id()),
            VendorFilter::WithinBounds(bbox) => {
                bbox.contains(doc.summary.latitude, doc.summary.longitude)
            }
        }
    }
}

/// Insert-or-replace document collection keyed by vendor `id`.
///
/// Documents returned by a store always carry `outdated = Some(_)`: a document
/// written without the flag reads back as `Some(false)`. Results are ordered
/// by ascending `id`.
#[async_trait]
pub trait VendorStore: Send + Sync {
    /// Which collection this store is bound to; used in log fields.
    fn collection(&self) -> VendorCollection;

    /// Inserts `document`, replacing any existing document with the same `id`.
    async fn upsert(&self, document: &VendorDocument) -> Result<(), DbError>;

    /// Bulk form of [`VendorStore::upsert`]. Returns the number of documents written.
    async fn upsert_many(&self, documents: &[VendorDocument]) -> Result<u64, DbError>;

    /// Attaches `details` to the document with `id`. Returns `false` if no such
    /// document exists.
    async fn set_details(&self, id: i64, details: &VendorDetail) -> Result<bool, DbError>;

    async fn query(&self, filter: &VendorFilter) -> Result<Vec<VendorDocument>, DbError>;

    /// Id-only projection of [`VendorStore::query`].
    async fn query_ids(&self, filter: &VendorFilter) -> Result<Vec<i64>, DbError>;

    async fn count(&self, filter: &VendorFilter) -> Result<u64, DbError>;

    async fn delete_all(&self, filter: &VendorFilter) -> Result<u64, DbError>;

    /// Sets `outdated = true` on every matching document.
    async fn mark_outdated(&self, filter: &VendorFilter) -> Result<u64, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}
