//! In-process [`VendorStore`] backed by a `BTreeMap`.
//!
//! Used for tests and for dry-run refreshes that should not touch Postgres.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use zoodro_core::{VendorDetail, VendorDocument};

use crate::store::{VendorCollection, VendorFilter, VendorStore};
use crate::DbError;

#[derive(Debug)]
pub struct MemoryVendorStore {
    collection: VendorCollection,
    documents: RwLock<BTreeMap<i64, VendorDocument>>,
}

impl MemoryVendorStore {
    #[must_use]
    pub fn new(collection: VendorCollection) -> Self {
        Self {
            collection,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn staging() -> Self {
        Self::new(VendorCollection::Staging)
    }

    #[must_use]
    pub fn live() -> Self {
        Self::new(VendorCollection::Live)
    }

    /// Copies the current contents, ordered by id.
    pub async fn snapshot(&self) -> Vec<VendorDocument> {
        self.documents.read().await.values().cloned().collect()
    }
}

fn normalized(document: &VendorDocument) -> VendorDocument {
    let mut stored = document.clone();
    stored.outdated = Some(document.outdated.unwrap_or(false));
    stored
}

#[async_trait]
impl VendorStore for MemoryVendorStore {
    fn collection(&self) -> VendorCollection {
        self.collection
    }

    async fn upsert(&self, document: &VendorDocument) -> Result<(), DbError> {
        self.documents
            .write()
            .await
            .insert(document.id(), normalized(document));
        Ok(())
    }

    async fn upsert_many(&self, documents: &[VendorDocument]) -> Result<u64, DbError> {
        let mut guard = self.documents.write().await;
        let mut written = BTreeSet::new();
        for document in documents {
            guard.insert(document.id(), normalized(document));
            written.insert(document.id());
        }
        Ok(written.len() as u64)
    }

    async fn set_details(&self, id: i64, details: &VendorDetail) -> Result<bool, DbError> {
        let mut guard = self.documents.write().await;
        match guard.get_mut(&id) {
            Some(document) => {
                document.details = Some(details.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query(&self, filter: &VendorFilter) -> Result<Vec<VendorDocument>, DbError> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn query_ids(&self, filter: &VendorFilter) -> Result<Vec<i64>, DbError> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|doc| filter.matches(doc))
            .map(VendorDocument::id)
            .collect())
    }

    async fn count(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let guard = self.documents.read().await;
        Ok(guard.values().filter(|doc| filter.matches(doc)).count() as u64)
    }

    async fn delete_all(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let mut guard = self.documents.write().await;
        let before = guard.len();
        guard.retain(|_, doc| !filter.matches(doc));
        Ok((before - guard.len()) as u64)
    }

    async fn mark_outdated(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let mut guard = self.documents.write().await;
        let mut marked = 0u64;
        for doc in guard.values_mut().filter(|doc| filter.matches(doc)) {
            doc.outdated = Some(true);
            marked += 1;
        }
        Ok(marked)
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
