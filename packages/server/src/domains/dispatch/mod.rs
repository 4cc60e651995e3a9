//! Dispatch domain - monetized delivery of a lead to at most one provider
//!
//! The engine runs the charge cascade (direct pay-per-lead: the provider is
//! charged the moment they receive a lead, no credit balance). The service
//! wraps it with eligibility filtering and the unserved path.

pub mod engine;
pub mod models;
pub mod ranker;
pub mod stores;

pub use engine::{ChargeLog, DispatchEngine, DispatchOutcome, LeadTransitions};
pub use models::{idempotency_key, ChargeAttempt, ChargeStatus};
pub use ranker::{ranker_from_config, CandidateRanker, NearestFirstRanker, RandomRanker};
pub use stores::{PgChargeLog, PgLeadTransitions};

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::domains::leads::Lead;
use crate::domains::notifications::models::{AttemptChannel, NotificationKind};
use crate::domains::notifications::outbox::{
    LeadSnapshot, NotificationOutbox, NotificationPayload, OutboxMessage,
};
use crate::domains::providers::{eligibility, Provider};

/// Cascade plus the surrounding policy: eligibility filtering up front,
/// unserved marking and the operator alert at the back.
pub struct DispatchService {
    engine: DispatchEngine,
    leads: Arc<dyn LeadTransitions>,
    outbox: Arc<dyn NotificationOutbox>,
    admin_email: Option<String>,
}

impl DispatchService {
    pub fn new(
        engine: DispatchEngine,
        leads: Arc<dyn LeadTransitions>,
        outbox: Arc<dyn NotificationOutbox>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            engine,
            leads,
            outbox,
            admin_email,
        }
    }

    /// Route a lead through the charge cascade.
    ///
    /// `roster` is the pre-loaded charge-candidate roster; coverage and
    /// payment-capability filtering happens here. On exhaustion the lead is
    /// marked `UNSERVED` and exactly one operator alert is queued (the
    /// conditional transition dedupes alerts under reprocessing).
    pub async fn dispatch_lead(&self, lead: &Lead, roster: &[Provider]) -> Result<DispatchOutcome> {
        let candidates: Vec<Provider> = roster
            .iter()
            .filter(|p| eligibility::charge_cascade_eligible(p, &lead.zip))
            .cloned()
            .collect();

        info!(lead_id = %lead.id, zip = %lead.zip, count = candidates.len(),
            "Eligible charge candidates");

        match self.engine.dispatch(lead, candidates).await? {
            outcome @ DispatchOutcome::Delivered { .. } => Ok(outcome),
            DispatchOutcome::Unserved => {
                if self.leads.mark_unserved(lead.id).await? {
                    self.queue_admin_alert(lead).await;
                }
                Ok(DispatchOutcome::Unserved)
            }
        }
    }

    /// Best-effort operator alert; a queue failure is logged, never raised.
    async fn queue_admin_alert(&self, lead: &Lead) {
        let Some(admin_email) = &self.admin_email else {
            return;
        };

        let message = OutboxMessage {
            lead_id: lead.id,
            provider_id: None,
            channel: AttemptChannel::Email,
            kind: NotificationKind::AdminUnserved,
            payload: NotificationPayload {
                to: admin_email.clone(),
                provider_name: None,
                lead: LeadSnapshot::from_lead(lead),
                error: None,
                distance_miles: None,
            },
        };

        if let Err(err) = self.outbox.enqueue(message).await {
            error!(lead_id = %lead.id, error = %err, "Failed to queue unserved-lead alert");
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

    fn service(
        gateway: Arc<MockPaymentGateway>,
        leads: Arc<InMemoryLeadTransitions>,
        charges: Arc<InMemoryChargeLog>,
        outbox: Arc<InMemoryOutbox>,
    ) -> DispatchService {
        let engine = DispatchEngine::new(
            leads.clone(),
            charges,
            gateway,
            outbox.clone(),
            Arc::new(PassthroughRanker),
        );
        DispatchService::new(engine, leads, outbox, Some("ops@mobilephlebotomy.org".into()))
    }

    #[tokio::test]
    async fn skips_payment_less_provider_and_charges_the_covered_one() {
        // Scenario: X covers by wildcard but has no payment method, Y covers
        // exactly and has both Stripe references.
        let mut x = provider_fixture("Provider X", "902*");
        x.stripe_payment_method_id = None;
        let y = provider_fixture("Provider Y", "90210");
        let y_id = y.id;

        let gateway = Arc::new(MockPaymentGateway::always_succeeding());
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let service = service(gateway.clone(), leads.clone(), charges.clone(), outbox);

        let lead = lead_fixture("90210", "CA");
        let outcome = service.dispatch_lead(&lead, &[x, y]).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { provider_id: y_id });
        assert_eq!(gateway.requests().len(), 1);
        assert_eq!(leads.status_of(lead.id), Some(LeadStatus::Delivered));
        assert_eq!(leads.routed_to(lead.id), Some(y_id));
    }

    #[tokio::test]
    async fn unserved_lead_queues_exactly_one_admin_alert() {
        let gateway = Arc::new(MockPaymentGateway::always_succeeding());
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let service = service(gateway.clone(), leads.clone(), charges, outbox.clone());

        let lead = lead_fixture("59901", "MT");
        let outcome = service.dispatch_lead(&lead, &[]).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Unserved);
        assert_eq!(leads.status_of(lead.id), Some(LeadStatus::Unserved));
        assert_eq!(gateway.requests().len(), 0);
        assert_eq!(outbox.count_of_kind(NotificationKind::AdminUnserved), 1);

        // Reprocessing the same lead must not duplicate the alert
        service.dispatch_lead(&lead, &[]).await.unwrap();
        assert_eq!(outbox.count_of_kind(NotificationKind::AdminUnserved), 1);
    }

    #[tokio::test]
    async fn provider_without_coverage_for_the_zip_is_filtered_out() {
        let elsewhere = provider_fixture("Elsewhere Draws", "33101");

        let gateway = Arc::new(MockPaymentGateway::always_succeeding());
        let leads = Arc::new(InMemoryLeadTransitions::new());
        let charges = Arc::new(InMemoryChargeLog::new());
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let service = service(gateway.clone(), leads.clone(), charges, outbox);

        let lead = lead_fixture("90210", "CA");
        let outcome = service.dispatch_lead(&lead, &[elsewhere]).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Unserved);
        assert_eq!(gateway.requests().len(), 0);
    }
}
