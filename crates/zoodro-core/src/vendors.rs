//! Vendor documents as scraped from the upstream listing API.
//!
//! ## Observed upstream shape
//!
//! ### Summary fields
//! The listing endpoint returns many fields per vendor (`superType`,
//! `vendorTag`, `area`, `rating`, ...). Only `id`, `title`, `latitude`,
//! `longitude` and `maxOfferPercent` are read by this service; everything
//! else is carried through verbatim in [`VendorSummary::extra`].
//!
//! ### `maxOfferPercent`
//! A JSON number that is sometimes fractional (`12.5`) and occasionally
//! `null` for vendors without a running discount. `null` is read as `0`.
//!
//! ### Details
//! The detail endpoint returns an arbitrary JSON object. The only part this
//! service interprets is `offer.upperLimit` / `offer.lowerLimit`. The payload
//! is stored as-is under `details`, and absence of `details` means the vendor
//! has not been enriched yet.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One vendor entry from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorSummary {
    /// Upstream vendor ID; stable across refreshes.
    pub id: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub latitude: f64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub longitude: f64,

    #[serde(
        rename = "maxOfferPercent",
        default,
        deserialize_with = "null_as_default"
    )]
    pub max_offer_percent: f64,

    /// Every other upstream field, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw vendor detail payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorDetail(pub Value);

/// Discount bounds read from `details.offer`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VendorOffer {
    pub upper_limit: Option<f64>,
    pub lower_limit: Option<f64>,
}

/// A vendor as stored in the staging and live collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorDocument {
    #[serde(flatten)]
    pub summary: VendorSummary,

    /// A present `details` key, even one holding `null`, counts as enriched.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_details"
    )]
    pub details: Option<VendorDetail>,

    /// Set on live documents while a refresh commit is in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdated: Option<bool>,
}

/// Map pin returned by the bounding-box query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPin {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub off: i64,
    pub max: Option<i64>,
    pub min: Option<i64>,
}

impl VendorDetail {
    /// Reads `offer.upperLimit` and `offer.lowerLimit`, if present and numeric.
    #[must_use]
    pub fn offer(&self) -> Option<VendorOffer> {
        let offer = self.0.get("offer")?.as_object()?;
        Some(VendorOffer {
            upper_limit: offer.get("upperLimit").and_then(Value::as_f64),
            lower_limit: offer.get("lowerLimit").and_then(Value::as_f64),
        })
    }

    /// `true` when the payload is a JSON object, the only shape the detail
    /// endpoint returns on success.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }
}

impl VendorDocument {
    /// A freshly listed vendor: no details, no outdated marker.
    #[must_use]
    pub fn from_summary(summary: VendorSummary) -> Self {
        Self {
            summary,
            details: None,
            outdated: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.summary.id
    }

    #[must_use]
    pub fn has_details(&self) -> bool {
        self.details.is_some()
    }
}

fn present_details<'de, D>(deserializer: D) -> Result<Option<VendorDetail>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| Some(VendorDetail(value)))
}

impl VendorPin {
    /// Projects a stored vendor into the map-pin shape.
    ///
    /// `off` is the truncated `maxOfferPercent`. `max` / `min` are the
    /// truncated offer limits and are `None` both when the limit is absent and
    /// when it truncates to zero.
    #[must_use]
    pub fn from_document(doc: &VendorDocument) -> Self {
        let offer = doc
            .details
            .as_ref()
            .and_then(VendorDetail::offer)
            .unwrap_or_default();

        Self {
            lat: doc.summary.latitude,
            lng: doc.summary.longitude,
            name: doc.summary.title.clone(),
            off: truncate_percent(doc.summary.max_offer_percent),
            max: nonzero_percent(offer.upper_limit),
            min: nonzero_percent(offer.lower_limit),
        }
    }
}

/// Truncates a percentage toward zero. Non-finite values map to `0`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn truncate_percent(value: f64) -> i64 {
    if value.is_finite() {
        // `as` saturates at the i64 bounds.
        value.trunc() as i64
    } else {
        0
    }
}

fn nonzero_percent(value: Option<f64>) -> Option<i64> {
    value.map(truncate_percent).filter(|v| *v != 0)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
#[path = "vendors_test.rs"]
mod tests;
