//! Three-phase refresh: listing, detail enrichment, commit.
//!
//! Listing clears the staging collection and pages through the upstream
//! listing until an empty page (or an upstream error, which is accepted as a
//! partial listing). Enrichment makes bounded passes over vendors still
//! missing details, fanning out one request per vendor within each batch.
//! Commit marks every live document outdated, copies enriched staging
//! documents over them, and prunes whatever is still outdated, so the live
//! collection is never empty while a cycle is in flight.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use zoodro_db::{VendorFilter, VendorStore};
use zoodro_core::VendorDocument;
use zoodro_scraper::VendorSource;

use crate::error::{DetailFetchError, RefreshError};
use crate::policy::RefreshPolicy;
use crate::report::RefreshReport;

pub struct RefreshPipeline {
    source: Arc<dyn VendorSource>,
    staging: Arc<dyn VendorStore>,
    live: Arc<dyn VendorStore>,
    policy: RefreshPolicy,
    /// Held for the duration of a cycle; a second caller gets `AlreadyRunning`.
    in_flight: Mutex<()>,
}

impl RefreshPipeline {
    #[must_use]
    pub fn new(
        source: Arc<dyn VendorSource>,
        staging: Arc<dyn VendorStore>,
        live: Arc<dyn VendorStore>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            source,
            staging,
            live,
            policy,
            in_flight: Mutex::new(()),
        }
    }

    /// Runs one full cycle.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::AlreadyRunning`] if another cycle holds this pipeline.
    /// - [`RefreshError::Store`] on any staging or live store failure.
    /// - [`RefreshError::EmptyCycle`] if no vendor ended up with details; the
    ///   live collection is left untouched in that case.
    pub async fn run(&self) -> Result<RefreshReport, RefreshError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Err(RefreshError::AlreadyRunning);
        };

        let mut report = RefreshReport {
            started_at: Utc::now(),
            ..RefreshReport::default()
        };

        tracing::info!("refresh: listing vendors");
        self.list_vendors(&mut report).await?;

        tracing::info!(vendors = report.vendors_listed, "refresh: enriching details");
        self.enrich_details(&mut report).await?;

        tracing::info!("refresh: committing to live collection");
        self.commit(&mut report).await?;

        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Runs one cycle and logs the outcome. Never returns an error, so a
    /// scheduler can call it on every tick.
    pub async fn run_logged(&self) -> Option<RefreshReport> {
        match self.run().await {
            Ok(report) => {
                tracing::info!(
                    vendors_listed = report.vendors_listed,
                    listing_truncated = report.listing_truncated,
                    detail_passes = report.detail_passes,
                    detail_failures = report.detail_failures,
                    vendors_missing_details = report.vendors_missing_details,
                    vendors_committed = report.vendors_committed,
                    vendors_pruned = report.vendors_pruned,
                    elapsed_ms = report.elapsed().num_milliseconds(),
                    "refresh: cycle complete"
                );
                Some(report)
            }
            Err(RefreshError::AlreadyRunning) => {
                tracing::warn!("refresh: previous cycle still running; skipping");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "refresh: cycle failed");
                None
            }
        }
    }

    async fn list_vendors(&self, report: &mut RefreshReport) -> Result<(), RefreshError> {
        let cleared = self.staging.delete_all(&VendorFilter::All).await?;
        tracing::debug!(cleared, collection = %self.staging.collection(), "refresh: staging cleared");

        let page_size = self.policy.list_page_size;
        let mut page_number: u32 = 1;

        loop {
            report.pages_fetched += 1;

            let vendors = match self.source.list_page(page_number, page_size).await {
                Ok(vendors) => vendors,
                Err(e) => {
                    tracing::warn!(
                        page = page_number,
                        error = %e,
                        "refresh: listing stopped early on upstream error"
                    );
                    report.listing_truncated = true;
                    break;
                }
            };

            if vendors.is_empty() {
                break;
            }

            let documents: Vec<VendorDocument> =
                vendors.into_iter().map(VendorDocument::from_summary).collect();
            self.staging.upsert_many(&documents).await?;
            tracing::debug!(page = page_number, count = documents.len(), "refresh: page staged");

            let Some(next) = page_number.checked_add(1) else {
                break;
            };
            page_number = next;
        }

        report.vendors_listed = self.staging.count(&VendorFilter::All).await?;
        Ok(())
    }

    async fn enrich_details(&self, report: &mut RefreshReport) -> Result<(), RefreshError> {
        let batch_size = self.policy.detail_batch_size.max(1);

        for pass in 1..=self.policy.detail_max_passes {
            let missing = self.staging.query_ids(&VendorFilter::MissingDetails).await?;
            if missing.is_empty() {
                break;
            }

            report.detail_passes = pass;
            tracing::info!(pass, missing = missing.len(), "refresh: detail pass");

            for batch in missing.chunks(batch_size) {
                let outcomes: Vec<Result<(), DetailFetchError>> = stream::iter(batch.iter().copied())
                    .map(|vendor_id| self.enrich_one(vendor_id))
                    .buffer_unordered(batch_size)
                    .collect()
                    .await;

                for outcome in outcomes {
                    match outcome {
                        Ok(()) => report.details_fetched += 1,
                        Err(e) => {
                            report.detail_failures += 1;
                            tracing::warn!(
                                vendor_id = e.vendor_id(),
                                pass,
                                error = %e,
                                "refresh: detail fetch failed; will retry next pass"
                            );
                        }
                    }
                }

                if !self.policy.batch_delay.is_zero() {
                    tokio::time::sleep(self.policy.batch_delay).await;
                }
            }

            if pass < self.policy.detail_max_passes && !self.policy.pass_delay.is_zero() {
                tokio::time::sleep(self.policy.pass_delay).await;
            }
        }

        report.vendors_missing_details = self.staging.count(&VendorFilter::MissingDetails).await?;
        if report.vendors_missing_details > 0 {
            tracing::warn!(
                count = report.vendors_missing_details,
                max_passes = self.policy.detail_max_passes,
                "refresh: vendors still missing details after last pass; dropping them from this cycle"
            );
        }

        Ok(())
    }

    async fn enrich_one(&self, vendor_id: i64) -> Result<(), DetailFetchError> {
        let detail = self
            .source
            .fetch_detail(vendor_id)
            .await
            .map_err(|source| DetailFetchError::Upstream { vendor_id, source })?;

        let stored = self
            .staging
            .set_details(vendor_id, &detail)
            .await
            .map_err(|source| DetailFetchError::Store { vendor_id, source })?;

        if stored {
            Ok(())
        } else {
            Err(DetailFetchError::Vanished { vendor_id })
        }
    }

    async fn commit(&self, report: &mut RefreshReport) -> Result<(), RefreshError> {
        let staged = self.staging.query_ids(&VendorFilter::HasDetails).await?;

        // An empty commit would mark and then prune every live vendor.
        if staged.is_empty() {
            tracing::warn!(
                vendors_listed = report.vendors_listed,
                "refresh: no enriched vendors; skipping commit"
            );
            return Err(RefreshError::EmptyCycle);
        }

        let marked = self.live.mark_outdated(&VendorFilter::All).await?;
        tracing::debug!(marked, "refresh: live documents marked outdated");

        for chunk in staged.chunks(self.policy.commit_chunk_size.max(1)) {
            let fresh: Vec<VendorDocument> = self
                .staging
                .query(&VendorFilter::IdIn(chunk.to_vec()))
                .await?
                .into_iter()
                .map(|mut doc| {
                    doc.outdated = Some(false);
                    doc
                })
                .collect();
            report.vendors_committed += self.live.upsert_many(&fresh).await?;
        }

        report.vendors_pruned = self.live.delete_all(&VendorFilter::Outdated).await?;
        Ok(())
    }
}
