// Mobile Blood-Draw Marketplace - API Core
//
// Backend for the provider directory and the lead dispatch engine: eligibility
// matching, the charge cascade (direct pay-per-lead), and multi-channel
// provider notification with an auditable outbox.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
