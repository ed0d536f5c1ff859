//! Map viewport query over the live vendor collection.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use zoodro_core::{BoundingBox, VendorDocument, VendorPin};
use zoodro_db::VendorFilter;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, AppState};

/// Raw query string. Coordinates are parsed by hand so a bad value yields a
/// `validation_error` naming the field instead of a bare extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub(super) struct VendorsQuery {
    top_left_lat: Option<String>,
    top_left_lng: Option<String>,
    bottom_right_lat: Option<String>,
    bottom_right_lng: Option<String>,
    min_off: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct VendorsResponse {
    vendors: Vec<VendorPin>,
}

pub(super) async fn list_vendors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<VendorsQuery>,
) -> Result<Json<VendorsResponse>, ApiError> {
    let (bbox, min_off) =
        parse_query(&query).map_err(|msg| ApiError::new(req_id.0.clone(), "validation_error", msg))?;

    let mut docs = state
        .live
        .query(&VendorFilter::WithinBounds(bbox))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    sort_by_offer(&mut docs);

    let vendors = docs
        .iter()
        .map(VendorPin::from_document)
        .filter(|pin| pin.off >= min_off)
        .collect();

    Ok(Json(VendorsResponse { vendors }))
}

fn parse_query(query: &VendorsQuery) -> Result<(BoundingBox, i64), String> {
    let bbox = BoundingBox::new(
        parse_coordinate("top_left_lat", query.top_left_lat.as_deref())?,
        parse_coordinate("top_left_lng", query.top_left_lng.as_deref())?,
        parse_coordinate("bottom_right_lat", query.bottom_right_lat.as_deref())?,
        parse_coordinate("bottom_right_lng", query.bottom_right_lng.as_deref())?,
    )
    .map_err(|e| e.to_string())?;

    let min_off = match query.min_off.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| format!("min_off must be an integer, got {raw:?}"))?,
    };

    Ok((bbox, min_off))
}

fn parse_coordinate(field: &'static str, raw: Option<&str>) -> Result<f64, String> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{field} is required"))?;
    raw.parse::<f64>()
        .map_err(|_| format!("{field} must be a number, got {raw:?}"))
}

/// Highest discount first; ties keep ascending id order.
fn sort_by_offer(docs: &mut [VendorDocument]) {
    docs.sort_by(|a, b| {
        b.summary
            .max_offer_percent
            .total_cmp(&a.summary.max_offer_percent)
            .then_with(|| a.id().cmp(&b.id()))
    });
}
