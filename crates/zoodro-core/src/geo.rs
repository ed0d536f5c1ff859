//! Geographic bounding boxes for map viewport queries.
//!
//! The map client sends its viewport as a top-left / bottom-right corner
//! pair. Latitude grows northwards, so the top-left corner carries the
//! *larger* latitude and the *smaller* longitude.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("top_left_lat ({top}) must not be below bottom_right_lat ({bottom})")]
    InvertedLatitude { top: f64, bottom: f64 },

    #[error("top_left_lng ({left}) must not be east of bottom_right_lng ({right})")]
    InvertedLongitude { left: f64, right: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left_lat: f64,
    pub top_left_lng: f64,
    pub bottom_right_lat: f64,
    pub bottom_right_lng: f64,
}

impl BoundingBox {
    /// Builds a bounding box, rejecting non-finite, out-of-range, or inverted
    /// corners.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError`] describing the first invalid coordinate found.
    pub fn new(
        top_left_lat: f64,
        top_left_lng: f64,
        bottom_right_lat: f64,
        bottom_right_lng: f64,
    ) -> Result<Self, BoundsError> {
        check_coordinate("top_left_lat", top_left_lat, 90.0)?;
        check_coordinate("top_left_lng", top_left_lng, 180.0)?;
        check_coordinate("bottom_right_lat", bottom_right_lat, 90.0)?;
        check_coordinate("bottom_right_lng", bottom_right_lng, 180.0)?;

        if top_left_lat < bottom_right_lat {
            return Err(BoundsError::InvertedLatitude {
                top: top_left_lat,
                bottom: bottom_right_lat,
            });
        }
        if top_left_lng > bottom_right_lng {
            return Err(BoundsError::InvertedLongitude {
                left: top_left_lng,
                right: bottom_right_lng,
            });
        }

        Ok(Self {
            top_left_lat,
            top_left_lng,
            bottom_right_lat,
            bottom_right_lng,
        })
    }

    /// Inclusive containment check.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude <= self.top_left_lat
            && latitude >= self.bottom_right_lat
            && longitude >= self.top_left_lng
            && longitude <= self.bottom_right_lng
    }
}

fn check_coordinate(field: &'static str, value: f64, limit: f64) -> Result<(), BoundsError> {
    if !value.is_finite() {
        return Err(BoundsError::NotFinite { field });
    }
    if value.abs() > limit {
        return Err(BoundsError::OutOfRange { field, value });
    }
    Ok(())
}
