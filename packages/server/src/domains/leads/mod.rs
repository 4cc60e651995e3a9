//! Leads domain - incoming service requests and their pricing

pub mod models;
pub mod pricing;

pub use models::{CreateLead, Lead, LeadStatus, Urgency};
pub use pricing::{format_price, price_for};
