use serde::Deserialize;
use thiserror::Error;

/// Subset of the PaymentIntent resource the caller needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentResponse {
    pub id: String,
    /// "succeeded", "requires_action", "requires_payment_method", ...
    pub status: String,
    pub amount: i64,
    pub currency: String,
}

impl PaymentIntentResponse {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Error envelope Stripe wraps every non-2xx response in.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StripeErrorDetail {
    pub fn into_api_error(self) -> StripeApiError {
        let reason = self
            .decline_code
            .or(self.code)
            .or(self.message.clone())
            .unwrap_or_else(|| self.error_type.clone());
        if self.error_type == "card_error" {
            StripeApiError::Card { reason }
        } else {
            StripeApiError::Api {
                kind: self.error_type,
                message: self.message.unwrap_or(reason),
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    /// The card was declined; `reason` is Stripe's decline/error code.
    #[error("card declined: {reason}")]
    Card { reason: String },
    /// Any non-card API error (invalid request, rate limit, ...).
    #[error("stripe {kind} error: {message}")]
    Api { kind: String, message: String },
    /// Network/transport failure or unparseable response.
    #[error("stripe request failed: {0}")]
    Request(String),
}
