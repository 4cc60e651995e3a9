//! Providers domain - service provider directory and lead eligibility

pub mod coverage;
pub mod eligibility;
pub mod models;

pub use coverage::covers_zip;
pub use models::{CreateProvider, Provider};
