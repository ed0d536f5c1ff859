//! Postgres-backed [`VendorStore`].
//!
//! Each collection is a table holding the vendor document as JSONB. The
//! `outdated` marker lives in its own column rather than inside the document,
//! and `has_details`, `latitude` and `longitude` are generated columns so
//! filters never need to reach into the JSON.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use zoodro_core::{VendorDetail, VendorDocument};

use crate::store::{VendorCollection, VendorFilter, VendorStore};
use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgVendorStore {
    pool: PgPool,
    collection: VendorCollection,
}

impl PgVendorStore {
    #[must_use]
    pub fn new(pool: PgPool, collection: VendorCollection) -> Self {
        Self { pool, collection }
    }

    #[must_use]
    pub fn staging(pool: PgPool) -> Self {
        Self::new(pool, VendorCollection::Staging)
    }

    #[must_use]
    pub fn live(pool: PgPool) -> Self {
        Self::new(pool, VendorCollection::Live)
    }

    fn table(&self) -> &'static str {
        self.collection.table()
    }

    /// Starts `"{head} FROM <table> WHERE <filter>"`. `head` is the statement
    /// prefix up to the table name, e.g. `"SELECT id"` or `"DELETE"`.
    fn filtered(&self, head: &str, filter: &VendorFilter) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("{head} FROM {} WHERE ", self.table()));
        push_filter(&mut qb, filter);
        qb
    }
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &VendorFilter) {
    match filter {
        VendorFilter::All => {
            qb.push("TRUE");
        }
        VendorFilter::MissingDetails => {
            qb.push("NOT has_details");
        }
        VendorFilter::HasDetails => {
            qb.push("has_details");
        }
        VendorFilter::Outdated => {
            qb.push("outdated");
        }
        VendorFilter::IdIn(ids) => {
            qb.push("id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
        VendorFilter::WithinBounds(bbox) => {
            qb.push("latitude BETWEEN ");
            qb.push_bind(bbox.bottom_right_lat);
            qb.push(" AND ");
            qb.push_bind(bbox.top_left_lat);
            qb.push(" AND longitude BETWEEN ");
            qb.push_bind(bbox.top_left_lng);
            qb.push(" AND ");
            qb.push_bind(bbox.bottom_right_lng);
        }
    }
}

/// Serializes a document for the `document` column. `outdated` is stored in
/// its own column and is stripped here.
fn encode(document: &VendorDocument) -> Result<Value, DbError> {
    let mut body = document.clone();
    body.outdated = None;
    serde_json::to_value(&body).map_err(|source| DbError::Document {
        id: document.id(),
        source,
    })
}

fn decode(id: i64, document: Value, outdated: bool) -> Result<VendorDocument, DbError> {
    let mut doc: VendorDocument =
        serde_json::from_value(document).map_err(|source| DbError::Document { id, source })?;
    doc.outdated = Some(outdated);
    Ok(doc)
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[async_trait]
impl VendorStore for PgVendorStore {
    fn collection(&self) -> VendorCollection {
        self.collection
    }

    async fn upsert(&self, document: &VendorDocument) -> Result<(), DbError> {
        let body = encode(document)?;
        let sql = format!(
            "INSERT INTO {} (id, document, outdated) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE \
             SET document = EXCLUDED.document, outdated = EXCLUDED.outdated, updated_at = NOW()",
            self.table()
        );

        sqlx::query(&sql)
            .bind(document.id())
            .bind(body)
            .bind(document.outdated.unwrap_or(false))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_many(&self, documents: &[VendorDocument]) -> Result<u64, DbError> {
        // ON CONFLICT cannot touch the same row twice in one statement, so
        // collapse duplicates first; the last occurrence wins.
        let mut latest: BTreeMap<i64, &VendorDocument> = BTreeMap::new();
        for document in documents {
            latest.insert(document.id(), document);
        }
        if latest.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(latest.len());
        let mut bodies = Vec::with_capacity(latest.len());
        let mut flags = Vec::with_capacity(latest.len());
        for (id, document) in latest {
            ids.push(id);
            bodies.push(encode(document)?);
            flags.push(document.outdated.unwrap_or(false));
        }

        let sql = format!(
            "INSERT INTO {} (id, document, outdated) \
             SELECT * FROM UNNEST($1::bigint[], $2::jsonb[], $3::bool[]) \
             ON CONFLICT (id) DO UPDATE \
             SET document = EXCLUDED.document, outdated = EXCLUDED.outdated, updated_at = NOW()",
            self.table()
        );

        let result = sqlx::query(&sql)
            .bind(ids)
            .bind(bodies)
            .bind(flags)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_details(&self, id: i64, details: &VendorDetail) -> Result<bool, DbError> {
        let sql = format!(
            "UPDATE {} \
             SET document = jsonb_set(document, '{{details}}', $2, true), updated_at = NOW() \
             WHERE id = $1",
            self.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&details.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, filter: &VendorFilter) -> Result<Vec<VendorDocument>, DbError> {
        let mut qb = self.filtered("SELECT id, document, outdated", filter);
        qb.push(" ORDER BY id");

        let rows = qb
            .build_query_as::<(i64, Value, bool)>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, document, outdated)| decode(id, document, outdated))
            .collect()
    }

    async fn query_ids(&self, filter: &VendorFilter) -> Result<Vec<i64>, DbError> {
        let mut qb = self.filtered("SELECT id", filter);
        qb.push(" ORDER BY id");

        let ids = qb
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn count(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let mut qb = self.filtered("SELECT COUNT(*)", filter);
        let n = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(to_count(n))
    }

    async fn delete_all(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let mut qb = self.filtered("DELETE", filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn mark_outdated(&self, filter: &VendorFilter) -> Result<u64, DbError> {
        let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "UPDATE {} SET outdated = TRUE, updated_at = NOW() WHERE ",
            self.table()
        ));
        push_filter(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DbError> {
        crate::ping(&self.pool).await?;
        Ok(())
    }
}
