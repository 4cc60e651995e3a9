//! Charge-cascade engine.
//!
//! Iterates an ordered candidate list and charges each provider off-session
//! until one charge succeeds or the list is exhausted. Attempts are strictly
//! sequential; running them in parallel could charge two providers for the
//! same lead. Declines are expected and drive continuation; only the final
//! outcome is reported to the caller.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::common::{ChargeAttemptId, LeadId, ProviderId};
use crate::domains::dispatch::ranker::CandidateRanker;
use crate::domains::leads::pricing::format_price;
use crate::domains::leads::Lead;
use crate::domains::notifications::models::{AttemptChannel, NotificationKind};
use crate::domains::notifications::outbox::{
    LeadSnapshot, NotificationOutbox, NotificationPayload, OutboxMessage,
};
use crate::domains::providers::Provider;
use crate::kernel::{BasePaymentGateway, ChargeOutcome, ChargeRequest};

/// Terminal result of one dispatch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// One provider was charged; the lead is theirs.
    Delivered { provider_id: ProviderId },
    /// Every candidate declined (or none existed).
    Unserved,
}

/// Conditional lead state transitions. Both return whether this call won the
/// transition; a lead leaves `OPEN` exactly once.
#[async_trait]
pub trait LeadTransitions: Send + Sync {
    async fn mark_delivered(&self, lead_id: LeadId, provider_id: ProviderId) -> Result<bool>;
    async fn mark_unserved(&self, lead_id: LeadId) -> Result<bool>;
}

/// Reference to a persisted charge attempt, carrying the derived idempotency
/// key the gateway call must use.
#[derive(Debug, Clone)]
pub struct ChargeAttemptRef {
    pub id: ChargeAttemptId,
    pub ordinal: i32,
    pub idempotency_key: String,
}

/// Audit log of cascade charge attempts.
#[async_trait]
pub trait ChargeLog: Send + Sync {
    /// Persist an `ATTEMPTED` row with the next ordinal for this lead.
    async fn begin_attempt(
        &self,
        lead_id: LeadId,
        provider_id: ProviderId,
        amount_cents: i32,
    ) -> Result<ChargeAttemptRef>;

    async fn record_success(&self, id: ChargeAttemptId) -> Result<()>;

    async fn record_decline(&self, id: ChargeAttemptId, reason: &str) -> Result<()>;
}

pub struct DispatchEngine {
    leads: Arc<dyn LeadTransitions>,
    charges: Arc<dyn ChargeLog>,
    payments: Arc<dyn BasePaymentGateway>,
    outbox: Arc<dyn NotificationOutbox>,
    ranker: Arc<dyn CandidateRanker>,
}

impl DispatchEngine {
    pub fn new(
        leads: Arc<dyn LeadTransitions>,
        charges: Arc<dyn ChargeLog>,
        payments: Arc<dyn BasePaymentGateway>,
        outbox: Arc<dyn NotificationOutbox>,
        ranker: Arc<dyn CandidateRanker>,
    ) -> Self {
        Self {
            leads,
            charges,
            payments,
            outbox,
            ranker,
        }
    }

    /// Run the cascade over already-eligible candidates.
    ///
    /// At most one provider is successfully charged: the loop stops at the
    /// first success and never retries a prior candidate.
    pub async fn dispatch(&self, lead: &Lead, candidates: Vec<Provider>) -> Result<DispatchOutcome> {
        if candidates.is_empty() {
            info!(lead_id = %lead.id, zip = %lead.zip, "No eligible providers for lead");
            return Ok(DispatchOutcome::Unserved);
        }

        let ordered = self.ranker.order(&lead.zip, candidates).await;

        for provider in ordered {
            // Candidates are pre-filtered for payment capability
            let (Some(customer_ref), Some(payment_method_ref)) = (
                provider.stripe_customer_id.clone(),
                provider.stripe_payment_method_id.clone(),
            ) else {
                continue;
            };

            let attempt = self
                .charges
                .begin_attempt(lead.id, provider.id, lead.price_cents)
                .await?;

            info!(lead_id = %lead.id, provider_id = %provider.id, ordinal = attempt.ordinal,
                "Attempting to charge provider");

            let request = ChargeRequest {
                customer_ref,
                payment_method_ref,
                amount_minor_units: lead.price_cents as i64,
                currency: "usd".to_string(),
                description: format!(
                    "Lead: {} - {}, {} {}",
                    lead.full_name, lead.city, lead.state, lead.zip
                ),
                metadata: vec![
                    ("leadId".to_string(), lead.id.to_string()),
                    ("providerId".to_string(), provider.id.to_string()),
                    ("urgency".to_string(), lead.urgency.to_string()),
                    ("zip".to_string(), lead.zip.clone()),
                ],
                idempotency_key: attempt.idempotency_key.clone(),
            };

            let outcome = match self.payments.charge(request).await {
                Ok(outcome) => outcome,
                // Transport failures (including timeouts) count as declines;
                // the cascade moves on
                Err(err) => {
                    warn!(provider_id = %provider.id, error = %err, "Charge transport failed");
                    ChargeOutcome::Declined {
                        reason: format!("payment transport error: {}", err),
                    }
                }
            };

            match outcome {
                ChargeOutcome::Succeeded { payment_ref } => {
                    self.charges.record_success(attempt.id).await?;

                    let transitioned = self.leads.mark_delivered(lead.id, provider.id).await?;
                    if !transitioned {
                        warn!(lead_id = %lead.id, provider_id = %provider.id,
                            "Lead was no longer OPEN after a successful charge");
                    }

                    info!(lead_id = %lead.id, provider_id = %provider.id, %payment_ref,
                        amount = %format_price(lead.price_cents), "Lead routed to provider");

                    self.queue_delivered_notices(lead, &provider).await;

                    return Ok(DispatchOutcome::Delivered {
                        provider_id: provider.id,
                    });
                }
                ChargeOutcome::Declined { reason } => {
                    warn!(lead_id = %lead.id, provider_id = %provider.id, %reason,
                        "Payment declined for provider");

                    self.charges.record_decline(attempt.id, &reason).await?;
                    self.queue_payment_failed_notice(lead, &provider, &reason).await;
                }
            }
        }

        info!(lead_id = %lead.id, "No provider could be charged for lead");
        Ok(DispatchOutcome::Unserved)
    }

    /// Queue the success notices (email and SMS where the provider has the
    /// channel). Best-effort: a queue failure is logged and never unwinds the
    /// completed charge.
    async fn queue_delivered_notices(&self, lead: &Lead, provider: &Provider) {
        if let Some(recipient) = provider.notification_recipient() {
            let message = OutboxMessage {
                lead_id: lead.id,
                provider_id: Some(provider.id),
                channel: AttemptChannel::Email,
                kind: NotificationKind::LeadDelivered,
                payload: NotificationPayload {
                    to: recipient.to_string(),
                    provider_name: Some(provider.name.clone()),
                    lead: LeadSnapshot::from_lead(lead),
                    error: None,
                    distance_miles: None,
                },
            };
            if let Err(err) = self.outbox.enqueue(message).await {
                error!(provider_id = %provider.id, error = %err,
                    "Failed to queue lead notification email");
            }
        }

        if let Some(phone) = &provider.phone_public {
            let message = OutboxMessage {
                lead_id: lead.id,
                provider_id: Some(provider.id),
                channel: AttemptChannel::Sms,
                kind: NotificationKind::LeadDelivered,
                payload: NotificationPayload {
                    to: phone.clone(),
                    provider_name: Some(provider.name.clone()),
                    lead: LeadSnapshot::from_lead(lead),
                    error: None,
                    distance_miles: None,
                },
            };
            if let Err(err) = self.outbox.enqueue(message).await {
                error!(provider_id = %provider.id, error = %err,
                    "Failed to queue lead notification SMS");
            }
        }
    }

    /// Tell the declined provider they missed the lead. Best-effort.
    async fn queue_payment_failed_notice(&self, lead: &Lead, provider: &Provider, reason: &str) {
        let Some(recipient) = provider.notification_recipient() else {
            return;
        };

        let message = OutboxMessage {
            lead_id: lead.id,
            provider_id: Some(provider.id),
            channel: AttemptChannel::Email,
            kind: NotificationKind::PaymentFailed,
            payload: NotificationPayload {
                to: recipient.to_string(),
                provider_name: Some(provider.name.clone()),
                lead: LeadSnapshot::from_lead(lead),
                error: Some(reason.to_string()),
                distance_miles: None,
            },
        };

        if let Err(err) = self.outbox.enqueue(message).await {
            error!(provider_id = %provider.id, error = %err,
                "Failed to queue payment-failure notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::leads::LeadStatus;
    use crate::kernel::test_dependencies::{
        lead_fixture, provider_fixture, InMemoryChargeLog, InMemoryLeadTransitions, InMemoryOutbox,
        MockPaymentGateway, PassthroughRanker,
    };

    fn engine(
        gateway: Arc<MockPaymentGateway>,
        leads: Arc<InMemoryLeadTransitions>,
        charges: Arc<InMemoryChargeLog>,
        outbox: Arc<InMemoryOutbox>,
    ) -> DispatchEngine {
        DispatchEngine::new(leads, charges, gateway, outbox, Arc::new(PassthroughRanker))
    }

    #[tokio::test]
    async fn at_most_one_provider_is_charged() {
        let candidates = vec![
            provider_fixture("First Draws", "90210"),
            provider_fixture("Second Draws", "90210"),
            provider_fixture("Third Draws", "90210"),
        ];
        let first_id = candidates[0].id;

        let gateway = Arc::new(MockPaymentGateway::always_succeeding());
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway.clone(), leads.clone(), charges.clone(), outbox);

        let lead = lead_fixture("90210", "CA");
        let outcome = engine.dispatch(&lead, candidates).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { provider_id: first_id });
        assert_eq!(gateway.requests().len(), 1);
        assert_eq!(charges.successes(), 1);
        assert_eq!(leads.status_of(lead.id), Some(LeadStatus::Delivered));
    }

    #[tokio::test]
    async fn decline_advances_to_the_next_candidate() {
        // Scenario: the first candidate's charge is declined, the second
        // succeeds; the first gets a payment-failure notice.
        let first = provider_fixture("Declined Draws", "90210");
        let second = provider_fixture("Charged Draws", "90210");
        let (first_id, second_id) = (first.id, second.id);

        let gateway = Arc::new(MockPaymentGateway::with_script(vec![
            ChargeOutcome::Declined {
                reason: "card_declined".into(),
            },
            ChargeOutcome::Succeeded {
                payment_ref: "pi_2".into(),
            },
        ]));
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway.clone(), leads.clone(), charges.clone(), outbox.clone());

        let lead = lead_fixture("90210", "CA");
        let outcome = engine.dispatch(&lead, vec![first, second]).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { provider_id: second_id });
        assert_eq!(gateway.requests().len(), 2);
        assert_eq!(charges.declines(), 1);
        assert_eq!(charges.successes(), 1);
        assert_eq!(leads.routed_to(lead.id), Some(second_id));

        // One payment-failure notice, addressed to the declined provider
        let failures = outbox.of_kind(NotificationKind::PaymentFailed);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].provider_id, Some(first_id));
    }

    #[tokio::test]
    async fn exhausted_candidates_reports_unserved() {
        let candidates = vec![
            provider_fixture("Declined A", "90210"),
            provider_fixture("Declined B", "90210"),
        ];

        let gateway = Arc::new(MockPaymentGateway::with_script(vec![
            ChargeOutcome::Declined { reason: "insufficient_funds".into() },
            ChargeOutcome::Declined { reason: "expired_card".into() },
        ]));
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway.clone(), leads.clone(), charges.clone(), outbox);

        let lead = lead_fixture("90210", "CA");
        let outcome = engine.dispatch(&lead, candidates).await.unwrap();

        // The engine reports; marking UNSERVED is the caller's job
        assert_eq!(outcome, DispatchOutcome::Unserved);
        assert_eq!(charges.declines(), 2);
        assert_eq!(leads.status_of(lead.id), None);
    }

    #[tokio::test]
    async fn transport_failure_counts_as_a_decline() {
        let candidates = vec![
            provider_fixture("Timeout Draws", "90210"),
            provider_fixture("Backup Draws", "90210"),
        ];
        let backup_id = candidates[1].id;

        let gateway = Arc::new(MockPaymentGateway::failing_once_then(
            ChargeOutcome::Succeeded { payment_ref: "pi_9".into() },
        ));
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway, leads.clone(), charges.clone(), outbox);

        let lead = lead_fixture("90210", "CA");
        let outcome = engine.dispatch(&lead, candidates).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { provider_id: backup_id });
        assert_eq!(charges.declines(), 1);
        assert!(charges
            .decline_reasons()
            .iter()
            .any(|r| r.contains("payment transport error")));
    }

    #[tokio::test]
    async fn idempotency_keys_carry_per_lead_ordinals() {
        let candidates = vec![
            provider_fixture("Declined A", "90210"),
            provider_fixture("Charged B", "90210"),
        ];
        let (a_id, b_id) = (candidates[0].id, candidates[1].id);

        let gateway = Arc::new(MockPaymentGateway::with_script(vec![
            ChargeOutcome::Declined { reason: "card_declined".into() },
            ChargeOutcome::Succeeded { payment_ref: "pi_1".into() },
        ]));
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway.clone(), leads, charges, outbox);

        let lead = lead_fixture("90210", "CA");
        engine.dispatch(&lead, candidates).await.unwrap();

        let keys: Vec<String> = gateway
            .requests()
            .iter()
            .map(|r| r.idempotency_key.clone())
            .collect();
        assert_eq!(
            keys,
            vec![
                format!("lead:{}:provider:{}:attempt:1", lead.id, a_id),
                format!("lead:{}:provider:{}:attempt:2", lead.id, b_id),
            ]
        );
    }

    #[tokio::test]
    async fn delivered_notices_cover_both_channels() {
        let provider = provider_fixture("Both Channels", "90210");

        let gateway = Arc::new(MockPaymentGateway::always_succeeding());
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let engine = engine(gateway, leads, charges, outbox.clone());

        let lead = lead_fixture("90210", "CA");
        engine.dispatch(&lead, vec![provider]).await.unwrap();

        let delivered = outbox.of_kind(NotificationKind::LeadDelivered);
        assert_eq!(delivered.len(), 2);
        let channels: Vec<AttemptChannel> = delivered.iter().map(|a| a.channel).collect();
        assert!(channels.contains(&AttemptChannel::Email));
        assert!(channels.contains(&AttemptChannel::Sms));
    }
}
