use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RefreshRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshRunItem {
    refresh_run_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    vendors_listed: i64,
    vendors_committed: i64,
    vendors_pruned: i64,
    error_message: Option<String>,
}

impl From<zoodro_db::RefreshRunRow> for RefreshRunItem {
    fn from(row: zoodro_db::RefreshRunRow) -> Self {
        Self {
            refresh_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            vendors_listed: row.vendors_listed,
            vendors_committed: row.vendors_committed,
            vendors_pruned: row.vendors_pruned,
            error_message: row.error_message,
        }
    }
}

pub(super) async fn list_refresh_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RefreshRunsQuery>,
) -> Result<Json<ApiResponse<Vec<RefreshRunItem>>>, ApiError> {
    let rows = zoodro_db::list_refresh_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RefreshRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
