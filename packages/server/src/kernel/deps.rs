//! Server dependencies (using traits for testability)
//!
//! Production adapters wrapping the transport client packages, plus the
//! central dependency container handed to routes and workers.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sendgrid::{MailMessage, SendGridOptions, SendGridService};
use sqlx::PgPool;
use stripe::{CreatePaymentIntent, StripeApiError, StripeOptions, StripeService};
use tracing::debug;
use twilio::{TwilioOptions, TwilioService};

use crate::config::Config;
use crate::domains::dispatch::{ranker_from_config, CandidateRanker};
use crate::domains::geo::PgGeocoder;
use crate::kernel::traits::{
    BaseEmailSender, BaseGeocoder, BasePaymentGateway, BaseSmsSender, ChargeOutcome,
    ChargeRequest, OutboundEmail,
};

// =============================================================================
// StripeService Adapter (implements BasePaymentGateway trait)
// =============================================================================

/// Wrapper around StripeService that implements BasePaymentGateway.
///
/// Card and API errors become `Declined` outcomes so the cascade advances;
/// only transport failures surface as errors (which the engine also treats
/// as declines).
pub struct StripeGateway(pub Arc<StripeService>);

impl StripeGateway {
    pub fn new(service: Arc<StripeService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BasePaymentGateway for StripeGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome> {
        let params = CreatePaymentIntent {
            amount_minor_units: request.amount_minor_units,
            currency: request.currency,
            customer: request.customer_ref,
            payment_method: request.payment_method_ref,
            description: Some(request.description),
            metadata: request.metadata,
            idempotency_key: Some(request.idempotency_key),
        };

        match self.0.create_payment_intent(params).await {
            Ok(intent) if intent.succeeded() => Ok(ChargeOutcome::Succeeded {
                payment_ref: intent.id,
            }),
            // Confirmed but not succeeded (e.g. requires_action off-session)
            Ok(intent) => Ok(ChargeOutcome::Declined {
                reason: format!("payment intent status: {}", intent.status),
            }),
            Err(StripeApiError::Card { reason }) => Ok(ChargeOutcome::Declined { reason }),
            Err(StripeApiError::Api { kind, message }) => Ok(ChargeOutcome::Declined {
                reason: format!("{}: {}", kind, message),
            }),
            Err(err @ StripeApiError::Request(_)) => Err(anyhow!(err)),
        }
    }
}

// =============================================================================
// SendGridService Adapter (implements BaseEmailSender trait)
// =============================================================================

pub struct SendGridEmailSender(pub Arc<SendGridService>);

impl SendGridEmailSender {
    pub fn new(service: Arc<SendGridService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseEmailSender for SendGridEmailSender {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        let message = MailMessage {
            to: email.to,
            from: email.from,
            subject: email.subject,
            text: email.text,
            html: email.html,
        };
        self.0
            .send(&message)
            .await
            .map_err(|e| anyhow!("{}", e))
    }
}

// =============================================================================
// TwilioService Adapter (implements BaseSmsSender trait)
// =============================================================================

pub struct TwilioSmsSender(pub Arc<TwilioService>);

impl TwilioSmsSender {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseSmsSender for TwilioSmsSender {
    async fn send(&self, recipient: &str, body: &str) -> Result<()> {
        let response = self
            .0
            .send_message(recipient, body)
            .await
            .map_err(|e| anyhow!("{}", e))?;
        debug!(sid = %response.sid, status = %response.status, "SMS handed to Twilio");
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to routes and workers.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub payments: Arc<dyn BasePaymentGateway>,
    pub email: Arc<dyn BaseEmailSender>,
    pub sms: Arc<dyn BaseSmsSender>,
    pub geocoder: Arc<dyn BaseGeocoder>,
    pub ranker: Arc<dyn CandidateRanker>,
}

impl ServerDeps {
    /// Wire production services from configuration.
    pub fn from_config(config: &Config, db_pool: PgPool) -> Self {
        let stripe = Arc::new(StripeService::new(StripeOptions {
            secret_key: config.stripe_secret_key.clone(),
        }));
        let sendgrid = Arc::new(SendGridService::new(SendGridOptions {
            api_key: config.sendgrid_api_key.clone(),
        }));
        let twilio = Arc::new(TwilioService::new(TwilioOptions {
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            messaging_service_sid: config.twilio_messaging_service_sid.clone(),
        }));
        let geocoder: Arc<dyn BaseGeocoder> = Arc::new(PgGeocoder::new(db_pool.clone()));

        Self {
            db_pool,
            payments: Arc::new(StripeGateway::new(stripe)),
            email: Arc::new(SendGridEmailSender::new(sendgrid)),
            sms: Arc::new(TwilioSmsSender::new(twilio)),
            geocoder: geocoder.clone(),
            ranker: ranker_from_config(&config.candidate_ranker, geocoder),
        }
    }
}
