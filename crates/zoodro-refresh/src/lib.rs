//! The vendor refresh cycle: list every vendor upstream into staging, enrich
//! each with its detail payload, then swap the result into the live
//! collection without a window where reads see an empty or half-built set.

pub mod error;
pub mod history;
pub mod pipeline;
pub mod policy;
pub mod report;

pub use error::{DetailFetchError, RefreshError};
pub use history::{postgres_pipeline, run_recorded};
pub use pipeline::RefreshPipeline;
pub use policy::RefreshPolicy;
pub use report::RefreshReport;
