pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use client::{UpstreamConfig, VendorApiClient};
pub use error::ScraperError;
pub use source::VendorSource;
pub use types::{Section, VendorPageResponse};
