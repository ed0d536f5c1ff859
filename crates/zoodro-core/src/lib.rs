pub mod app_config;
pub mod config;
pub mod geo;
pub mod vendors;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{BoundingBox, BoundsError};
pub use vendors::{
    truncate_percent, VendorDetail, VendorDocument, VendorOffer, VendorPin, VendorSummary,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
