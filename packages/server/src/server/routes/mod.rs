pub mod health;
pub mod leads;

pub use health::health_handler;
pub use leads::submit_lead_handler;
