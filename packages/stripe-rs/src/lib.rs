// Thin client for the Stripe PaymentIntents API.
// https://docs.stripe.com/api/payment_intents/create
//
// Only the off-session, confirm-immediately flow is wrapped: charges against
// a previously saved customer/payment-method pair with no cardholder present.

use std::collections::HashMap;
use std::time::Duration;

pub mod models;
use reqwest::{header, Client};

pub use crate::models::{PaymentIntentResponse, StripeApiError, StripeErrorBody};

#[derive(Debug, Clone)]
pub struct StripeOptions {
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct StripeService {
    options: StripeOptions,
    client: Client,
}

/// Parameters for an off-session charge.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    pub amount_minor_units: i64,
    pub currency: String,
    pub customer: String,
    pub payment_method: String,
    pub description: Option<String>,
    /// Attached verbatim as `metadata[key]` form fields.
    pub metadata: Vec<(String, String)>,
    /// Sent as the `Idempotency-Key` header so retries cannot double-charge.
    pub idempotency_key: Option<String>,
}

impl StripeService {
    pub fn new(options: StripeOptions) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { options, client }
    }

    /// Create and immediately confirm an off-session PaymentIntent.
    ///
    /// A non-2xx response with a parseable error body is returned as
    /// `StripeApiError::Card` (declines) or `StripeApiError::Api`; anything
    /// else surfaces as `StripeApiError::Request`.
    pub async fn create_payment_intent(
        &self,
        params: CreatePaymentIntent,
    ) -> Result<PaymentIntentResponse, StripeApiError> {
        let url = "https://api.stripe.com/v1/payment_intents";

        let mut form_body: HashMap<String, String> = HashMap::new();
        form_body.insert("amount".into(), params.amount_minor_units.to_string());
        form_body.insert("currency".into(), params.currency.clone());
        form_body.insert("customer".into(), params.customer.clone());
        form_body.insert("payment_method".into(), params.payment_method.clone());
        form_body.insert("off_session".into(), "true".into());
        form_body.insert("confirm".into(), "true".into());
        if let Some(description) = &params.description {
            form_body.insert("description".into(), description.clone());
        }
        for (key, value) in &params.metadata {
            form_body.insert(format!("metadata[{}]", key), value.clone());
        }

        let mut headers = header::HeaderMap::new();
        if let Some(idempotency_key) = &params.idempotency_key {
            headers.insert(
                "Idempotency-Key",
                idempotency_key
                    .parse()
                    .map_err(|_| StripeApiError::Request("invalid idempotency key".into()))?,
            );
        }

        let response = self
            .client
            .post(url)
            .basic_auth(&self.options.secret_key, None::<&str>)
            .headers(headers)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| StripeApiError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntentResponse>()
                .await
                .map_err(|e| StripeApiError::Request(format!("invalid response body: {}", e)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StripeApiError::Request(e.to_string()))?;

        match serde_json::from_str::<StripeErrorBody>(&body) {
            Ok(parsed) => Err(parsed.error.into_api_error()),
            Err(_) => Err(StripeApiError::Request(format!(
                "Stripe returned {}: {}",
                status, body
            ))),
        }
    }
}
