// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. Domain code
// (eligibility, the cascade, broadcasts) takes these as seams so tests can
// substitute recording fakes.
//
// Naming convention: Base* for trait names (e.g., BasePaymentGateway)

use anyhow::Result;
use async_trait::async_trait;

use crate::domains::geo::Coordinates;

// =============================================================================
// Geocoder Trait
// =============================================================================

/// ZIP centroid lookups. `Ok(None)` means the code is unknown to the dataset;
/// callers degrade to exact-string matching, they do not treat it as an error.
#[async_trait]
pub trait BaseGeocoder: Send + Sync {
    async fn coordinates_of(&self, zip: &str) -> Result<Option<Coordinates>>;
}

// =============================================================================
// Payment Gateway Trait
// =============================================================================

/// One off-session charge attempt against a provider's stored credentials.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub customer_ref: String,
    pub payment_method_ref: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub description: String,
    /// Lead/provider identifiers for gateway-side traceability.
    pub metadata: Vec<(String, String)>,
    /// Derived from (lead, provider, ordinal) so reprocessing cannot
    /// double-charge.
    pub idempotency_key: String,
}

/// Gateway verdict on a charge. Declines are expected and non-fatal; the
/// cascade advances to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { payment_ref: String },
    Declined { reason: String },
}

#[async_trait]
pub trait BasePaymentGateway: Send + Sync {
    /// Attempt the charge. `Err` is reserved for transport failures; the
    /// engine treats those as declines and continues.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome>;
}

// =============================================================================
// Messaging Traits
// =============================================================================

/// One outbound email, already composed.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait BaseEmailSender: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<()>;
}

#[async_trait]
pub trait BaseSmsSender: Send + Sync {
    /// Send `body` to `recipient` through the configured messaging service.
    async fn send(&self, recipient: &str, body: &str) -> Result<()>;
}
