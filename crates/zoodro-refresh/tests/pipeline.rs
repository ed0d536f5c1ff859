//! Refresh pipeline behaviour against a scripted upstream and in-memory stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use zoodro_core::{VendorDetail, VendorDocument, VendorSummary};
use zoodro_db::{DbError, MemoryVendorStore, VendorCollection, VendorFilter, VendorStore};
use zoodro_refresh::{RefreshError, RefreshPipeline, RefreshPolicy};
use zoodro_scraper::{ScraperError, VendorSource};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

const ALWAYS: u32 = u32::MAX;

fn summary(id: i64, title: &str) -> VendorSummary {
    VendorSummary {
        id,
        title: title.to_string(),
        latitude: 35.7,
        longitude: 51.4,
        max_offer_percent: 10.0,
        extra: serde_json::Map::new(),
    }
}

fn page(ids: &[i64]) -> Vec<VendorSummary> {
    ids.iter().map(|id| summary(*id, &format!("Vendor {id}"))).collect()
}

fn upstream_error() -> ScraperError {
    ScraperError::UnexpectedStatus {
        status: 503,
        url: "http://upstream.test".to_string(),
        body: String::new(),
    }
}

/// Pages are served in order; any page past the script is empty.
#[derive(Default)]
struct FakeSource {
    pages: Vec<Result<Vec<VendorSummary>, ()>>,
    /// Remaining failures per vendor; `ALWAYS` never succeeds.
    failures: Mutex<HashMap<i64, u32>>,
    detail_calls: Mutex<HashMap<i64, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// `(entered, release)`: listing signals `entered` then waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeSource {
    fn with_pages(pages: Vec<Result<Vec<VendorSummary>, ()>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    fn failing(self, vendor_id: i64, times: u32) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(vendor_id, times);
        self
    }

    fn calls_for(&self, vendor_id: i64) -> u32 {
        self.detail_calls
            .lock()
            .expect("calls lock")
            .get(&vendor_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl VendorSource for FakeSource {
    async fn list_page(
        &self,
        page_number: u32,
        _page_size: u32,
    ) -> Result<Vec<VendorSummary>, ScraperError> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        let index = usize::try_from(page_number - 1).expect("page index");
        match self.pages.get(index) {
            Some(Ok(vendors)) => Ok(vendors.clone()),
            Some(Err(())) => Err(upstream_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_detail(&self, vendor_id: i64) -> Result<VendorDetail, ScraperError> {
        *self
            .detail_calls
            .lock()
            .expect("calls lock")
            .entry(vendor_id)
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let should_fail = {
            let mut failures = self.failures.lock().expect("failures lock");
            match failures.get_mut(&vendor_id) {
                Some(remaining) if *remaining == ALWAYS => true,
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        if should_fail {
            return Err(upstream_error());
        }

        Ok(VendorDetail(json!({
            "offer": { "upperLimit": vendor_id * 1000, "lowerLimit": 0 }
        })))
    }
}

/// Live store wrapper that snapshots the id set after every write.
struct ObservedStore {
    inner: MemoryVendorStore,
    snapshots: Mutex<Vec<Vec<i64>>>,
}

impl ObservedStore {
    fn new() -> Self {
        Self {
            inner: MemoryVendorStore::live(),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self) {
        let ids = self
            .inner
            .query_ids(&VendorFilter::All)
            .await
            .expect("memory query");
        self.snapshots.lock().expect("snapshots lock").push(ids);
    }

    fn snapshots(&self) -> Vec<Vec<i64>> {
        self.snapshots.lock().expect("snapshots lock").clone()
    }
}

#[async_trait]
impl VendorStore for ObservedStore {
    fn collection(&self) -> VendorCollection {
        self.inner.collection()
    }

    async fn upsert(&self, document: &VendorDocument) -> Result<(), DbError> {
        self.inner.upsert(document).await?;
        self.record().await;
        Ok(())
    }

    async fn upsert_many(&self, documents: &[VendorDocument]) -> Result<u64, DbError> {
        let n = self.inner.upsert_many(documents).await?;
        self.record().await;
        Ok(n)
    }

    async fn set_details(&self, id: i64, details: &VendorDetail) -> Result<bool, DbError> {
        let stored = self.inner.set_details(id, details).await?;
        self.record().await;
        Ok(stored)
    }

    async fn query(&self, filter: &VendorFilter) -> Result<Vec<VendorDocument>, DbError> {
        self.inner.query(filter).await
    }

    async fn query_ids(&self, filter: &VendorFilter) -> Result<Vec<i64>, DbError> {
        self.inner.query_ids(filter).await
    }

    async fn count(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        self.inner.count(filter).await
    }

    async fn delete_all(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let n = self.inner.delete_all(filter).await?;
        self.record().await;
        Ok(n)
    }

    async fn mark_outdated(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let n = self.inner.mark_outdated(filter).await?;
        self.record().await;
        Ok(n)
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Live store wrapper whose `upsert_many` fails on the given call (1-based).
struct FailingChunkStore {
    inner: MemoryVendorStore,
    fail_on: usize,
    upsert_many_calls: AtomicUsize,
}

impl FailingChunkStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryVendorStore::live(),
            fail_on,
            upsert_many_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VendorStore for FailingChunkStore {
    fn collection(&self) -> VendorCollection {
        self.inner.collection()
    }

    async fn upsert(&self, document: &VendorDocument) -> Result<(), DbError> {
        self.inner.upsert(document).await
    }

    async fn upsert_many(&self, documents: &[VendorDocument]) -> Result<u64, DbError> {
        let call = self.upsert_many_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(DbError::NotFound);
        }
        self.inner.upsert_many(documents).await
    }

    async fn set_details(&self, id: i64, details: &VendorDetail) -> Result<bool, DbError> {
        self.inner.set_details(id, details).await
    }

    async fn query(&self, filter: &VendorFilter) -> Result<Vec<VendorDocument>, DbError> {
        self.inner.query(filter).await
    }

    async fn query_ids(&self, filter: &VendorFilter) -> Result<Vec<i64>, DbError> {
        self.inner.query_ids(filter).await
    }

    async fn count(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        self.inner.count(filter).await
    }

    async fn delete_all(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        self.inner.delete_all(filter).await
    }

    async fn mark_outdated(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        self.inner.mark_outdated(filter).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

fn enriched(id: i64) -> VendorDocument {
    let mut doc = VendorDocument::from_summary(summary(id, &format!("Old {id}")));
    doc.details = Some(VendorDetail(json!({ "offer": {} })));
    doc
}

fn pipeline(
    source: Arc<FakeSource>,
    staging: Arc<MemoryVendorStore>,
    live: Arc<dyn VendorStore>,
    policy: RefreshPolicy,
) -> RefreshPipeline {
    RefreshPipeline::new(source, staging, live, policy)
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_vendor_cycle_lands_enriched_documents_in_live() {
    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2, 3]))]));
    let staging = Arc::new(MemoryVendorStore::staging());
    let live = Arc::new(MemoryVendorStore::live());
    live.upsert(&enriched(4)).await.expect("seed");

    let report = pipeline(
        Arc::clone(&source),
        Arc::clone(&staging),
        live.clone(),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("cycle should succeed");

    assert_eq!(report.pages_fetched, 2);
    assert!(!report.listing_truncated);
    assert_eq!(report.vendors_listed, 3);
    assert_eq!(report.details_fetched, 3);
    assert_eq!(report.detail_passes, 1);
    assert_eq!(report.vendors_committed, 3);
    assert_eq!(report.vendors_pruned, 1);

    let docs = live.snapshot().await;
    assert_eq!(docs.iter().map(VendorDocument::id).collect::<Vec<_>>(), vec![1, 2, 3]);
    for doc in &docs {
        assert!(doc.has_details(), "vendor {} should have details", doc.id());
        assert_eq!(doc.outdated, Some(false));
    }
    let offer = docs[1].details.as_ref().and_then(VendorDetail::offer).expect("offer");
    assert_eq!(offer.upper_limit, Some(2000.0));
}

#[tokio::test]
async fn duplicate_ids_across_pages_keep_last_write() {
    let source = Arc::new(FakeSource::with_pages(vec![
        Ok(vec![summary(1, "first")]),
        Ok(vec![summary(1, "second"), summary(2, "other")]),
    ]));
    let live = Arc::new(MemoryVendorStore::live());

    pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("cycle");

    let docs = live.snapshot().await;
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].summary.title, "second");
}

// ---------------------------------------------------------------------------
// Commit safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_is_never_empty_and_retained_ids_never_disappear() {
    let live = Arc::new(ObservedStore::new());
    live.inner
        .upsert_many(&[enriched(1), enriched(2), enriched(9)])
        .await
        .expect("seed");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2, 3]))]));
    let policy = RefreshPolicy {
        commit_chunk_size: 1,
        ..RefreshPolicy::immediate()
    };

    let report = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        policy,
    )
    .run()
    .await
    .expect("cycle");

    let snapshots = live.snapshots();
    // mark + three single-document chunks + prune
    assert_eq!(snapshots.len(), 5);
    for ids in &snapshots {
        assert!(!ids.is_empty(), "live store was empty mid-commit");
        assert!(ids.contains(&1) && ids.contains(&2), "retained id missing: {ids:?}");
    }

    assert_eq!(report.vendors_pruned, 1);
    assert_eq!(
        live.query_ids(&VendorFilter::All).await.expect("ids"),
        vec![1, 2, 3]
    );
    assert_eq!(live.count(&VendorFilter::Outdated).await.expect("count"), 0);
}

#[tokio::test]
async fn failed_commit_chunk_keeps_every_previous_live_vendor() {
    let live = Arc::new(FailingChunkStore::new(2));
    live.inner
        .upsert_many(&[enriched(1), enriched(2), enriched(9)])
        .await
        .expect("seed");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2, 3]))]));
    let policy = RefreshPolicy {
        commit_chunk_size: 1,
        ..RefreshPolicy::immediate()
    };

    let result = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        policy,
    )
    .run()
    .await;

    assert!(matches!(result, Err(RefreshError::Store(DbError::NotFound))));
    assert_eq!(
        live.query_ids(&VendorFilter::All).await.expect("ids"),
        vec![1, 2, 9]
    );
    // Chunk 1 landed; nothing was pruned, so 2 and 9 remain marked.
    assert_eq!(
        live.query_ids(&VendorFilter::Outdated).await.expect("outdated"),
        vec![2, 9]
    );
}

#[tokio::test]
async fn vendors_absent_from_cycle_are_pruned() {
    let live = Arc::new(MemoryVendorStore::live());
    live.upsert_many(&[enriched(4), enriched(5)]).await.expect("seed");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[5, 6]))]));
    let report = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("cycle");

    assert_eq!(report.vendors_pruned, 1);
    let docs = live.snapshot().await;
    assert_eq!(docs.iter().map(VendorDocument::id).collect::<Vec<_>>(), vec![5, 6]);
    assert_eq!(docs[0].summary.title, "Vendor 5");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listing_twice_yields_identical_staging() {
    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2])), Ok(page(&[3]))]));
    let staging = Arc::new(MemoryVendorStore::staging());
    let p = pipeline(
        source,
        Arc::clone(&staging),
        Arc::new(MemoryVendorStore::live()),
        RefreshPolicy::immediate(),
    );

    p.run().await.expect("first cycle");
    let first = staging.snapshot().await;
    p.run().await.expect("second cycle");
    let second = staging.snapshot().await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn listing_error_keeps_pages_fetched_so_far() {
    let source = Arc::new(FakeSource::with_pages(vec![
        Ok(page(&[1, 2])),
        Err(()),
        Ok(page(&[3])),
    ]));
    let live = Arc::new(MemoryVendorStore::live());

    let report = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("partial listing is not a cycle failure");

    assert!(report.listing_truncated);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.vendors_listed, 2);
    assert_eq!(live.query_ids(&VendorFilter::All).await.expect("ids"), vec![1, 2]);
}

#[tokio::test]
async fn listing_clears_previous_staging_contents() {
    let staging = Arc::new(MemoryVendorStore::staging());
    staging.upsert(&enriched(77)).await.expect("leftover");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1]))]));
    pipeline(
        source,
        Arc::clone(&staging),
        Arc::new(MemoryVendorStore::live()),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("cycle");

    let ids: Vec<i64> = staging.snapshot().await.iter().map(VendorDocument::id).collect();
    assert_eq!(ids, vec![1]);
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_details_are_retried_on_later_passes() {
    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2, 3]))]).failing(2, 2));
    let live = Arc::new(MemoryVendorStore::live());

    let report = pipeline(
        Arc::clone(&source),
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        RefreshPolicy::immediate(),
    )
    .run()
    .await
    .expect("cycle");

    assert_eq!(report.detail_passes, 3);
    assert_eq!(report.detail_failures, 2);
    assert_eq!(report.vendors_missing_details, 0);
    assert_eq!(source.calls_for(2), 3);
    assert_eq!(source.calls_for(1), 1);
    assert_eq!(live.count(&VendorFilter::HasDetails).await.expect("count"), 3);
}

#[tokio::test]
async fn pass_cap_drops_vendors_that_never_enrich() {
    let live = Arc::new(MemoryVendorStore::live());
    live.upsert(&enriched(2)).await.expect("seed");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2]))]).failing(2, ALWAYS));
    let policy = RefreshPolicy {
        detail_max_passes: 4,
        ..RefreshPolicy::immediate()
    };

    let report = pipeline(
        Arc::clone(&source),
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        policy,
    )
    .run()
    .await
    .expect("cycle");

    assert_eq!(source.calls_for(2), 4);
    assert_eq!(report.detail_passes, 4);
    assert_eq!(report.vendors_missing_details, 1);
    assert_eq!(report.vendors_committed, 1);
    assert_eq!(report.vendors_pruned, 1);
    assert_eq!(live.query_ids(&VendorFilter::All).await.expect("ids"), vec![1]);
}

#[tokio::test]
async fn detail_fan_out_is_bounded_by_batch_size() {
    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[1, 2, 3, 4, 5, 6, 7]))]));
    let policy = RefreshPolicy {
        detail_batch_size: 3,
        ..RefreshPolicy::immediate()
    };

    let report = pipeline(
        Arc::clone(&source),
        Arc::new(MemoryVendorStore::staging()),
        Arc::new(MemoryVendorStore::live()),
        policy,
    )
    .run()
    .await
    .expect("cycle");

    assert_eq!(report.details_fetched, 7);
    let max = source.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "at most one batch in flight, saw {max}");
    assert!(max > 1, "vendors within a batch should be fetched concurrently");
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_without_enriched_vendors_leaves_live_untouched() {
    let live = Arc::new(MemoryVendorStore::live());
    live.upsert_many(&[enriched(1), enriched(2)]).await.expect("seed");

    let source = Arc::new(FakeSource::with_pages(vec![Ok(page(&[3]))]).failing(3, ALWAYS));
    let policy = RefreshPolicy {
        detail_max_passes: 2,
        ..RefreshPolicy::immediate()
    };

    let err = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        policy,
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, RefreshError::EmptyCycle), "got: {err:?}");
    assert_eq!(live.query_ids(&VendorFilter::All).await.expect("ids"), vec![1, 2]);
    assert_eq!(live.count(&VendorFilter::Outdated).await.expect("count"), 0);
}

#[tokio::test]
async fn empty_listing_is_an_empty_cycle() {
    let source = Arc::new(FakeSource::with_pages(vec![Err(())]));
    let p = pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        Arc::new(MemoryVendorStore::live()),
        RefreshPolicy::immediate(),
    );

    assert!(matches!(p.run().await, Err(RefreshError::EmptyCycle)));
    assert!(p.run_logged().await.is_none());
}

#[tokio::test]
async fn concurrent_run_is_rejected_while_a_cycle_is_in_flight() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = Arc::new(FakeSource {
        pages: vec![Ok(page(&[1]))],
        gate: Some((Arc::clone(&entered), Arc::clone(&release))),
        ..FakeSource::default()
    });

    let p = Arc::new(pipeline(
        source,
        Arc::new(MemoryVendorStore::staging()),
        Arc::new(MemoryVendorStore::live()),
        RefreshPolicy::immediate(),
    ));

    let first = tokio::spawn({
        let p = Arc::clone(&p);
        async move { p.run().await }
    });

    entered.notified().await;
    assert!(matches!(p.run().await, Err(RefreshError::AlreadyRunning)));

    // First page, then the terminating empty page.
    release.notify_one();
    entered.notified().await;
    release.notify_one();

    let report = first.await.expect("join").expect("first cycle");
    assert_eq!(report.vendors_committed, 1);
}
