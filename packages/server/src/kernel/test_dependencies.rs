// TestDependencies - mock implementations for testing
//
// Recording fakes for every infrastructure seam, plus in-memory stores that
// mirror the conditional-transition semantics of the Postgres models. Used by
// unit tests across the dispatch and notifications domains.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::common::{ChargeAttemptId, LeadId, NotificationId, ProviderId};
use crate::domains::dispatch::engine::{ChargeAttemptRef, ChargeLog, LeadTransitions};
use crate::domains::dispatch::models::idempotency_key;
use crate::domains::dispatch::ranker::CandidateRanker;
use crate::domains::geo::Coordinates;
use crate::domains::leads::{Lead, LeadStatus, Urgency};
use crate::domains::notifications::models::{
    AttemptStatus, NotificationAttempt, NotificationKind,
};
use crate::domains::notifications::outbox::{
    LeadSnapshot, NotificationOutbox, NotificationPayload, OutboxMessage,
};
use crate::domains::providers::Provider;
use crate::kernel::traits::{
    BaseEmailSender, BaseGeocoder, BasePaymentGateway, BaseSmsSender, ChargeOutcome,
    ChargeRequest, OutboundEmail,
};

// =============================================================================
// Fixtures
// =============================================================================

/// A charge-capable provider covering `zip_codes`, reachable by phone and
/// claim email. Tests unset fields to probe eligibility edges.
pub fn provider_fixture(name: &str, zip_codes: &str) -> Provider {
    Provider {
        id: ProviderId::new(),
        name: name.to_string(),
        phone_public: Some("+15559870000".to_string()),
        email: None,
        claim_email: Some("claims@providers.test".to_string()),
        notification_email: None,
        zip_codes: Some(zip_codes.to_string()),
        service_radius_miles: None,
        coverage_states: vec![],
        stripe_customer_id: Some("cus_test".to_string()),
        stripe_payment_method_id: Some("pm_test".to_string()),
        eligible_for_leads: true,
        is_featured: false,
        notify_enabled: false,
        created_at: Utc::now(),
    }
}

/// An open STANDARD-urgency lead at the given location.
pub fn lead_fixture(zip: &str, state: &str) -> Lead {
    Lead {
        id: LeadId::new(),
        full_name: "Jane Doe".to_string(),
        phone: "+15551234567".to_string(),
        email: None,
        address1: None,
        city: "Springfield".to_string(),
        state: state.to_string(),
        zip: zip.to_string(),
        urgency: Urgency::Standard,
        notes: None,
        price_cents: 2000,
        source: "web_form".to_string(),
        status: LeadStatus::Open,
        routed_to_id: None,
        routed_at: None,
        created_at: Utc::now(),
    }
}

/// A queued-notification payload addressed to `to`.
pub fn payload_fixture(to: &str) -> NotificationPayload {
    NotificationPayload {
        to: to.to_string(),
        provider_name: Some("Acme Mobile Draws".to_string()),
        lead: LeadSnapshot::from_lead(&lead_fixture("90210", "CA")),
        error: None,
        distance_miles: None,
    }
}

// =============================================================================
// Static Geocoder
// =============================================================================

/// Geocoder over a fixed in-memory map. Unknown ZIPs resolve to `None`,
/// exercising the documented exact-match fallback.
pub struct StaticGeocoder {
    coordinates: HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self {
            coordinates: HashMap::new(),
        }
    }

    pub fn with_zip(mut self, zip: &str, latitude: f64, longitude: f64) -> Self {
        self.coordinates.insert(
            zip.to_string(),
            Coordinates {
                latitude,
                longitude,
            },
        );
        self
    }
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGeocoder for StaticGeocoder {
    async fn coordinates_of(&self, zip: &str) -> Result<Option<Coordinates>> {
        Ok(self.coordinates.get(zip).copied())
    }
}

// =============================================================================
// Mock Payment Gateway
// =============================================================================

enum ScriptStep {
    Outcome(ChargeOutcome),
    TransportError(String),
}

/// Gateway that replays a scripted sequence of outcomes and records every
/// request it saw. An exhausted script succeeds.
pub struct MockPaymentGateway {
    script: Mutex<Vec<ScriptStep>>,
    requests: Mutex<Vec<ChargeRequest>>,
}

impl MockPaymentGateway {
    pub fn always_succeeding() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(outcomes: Vec<ChargeOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().map(ScriptStep::Outcome).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// First call fails at the transport level, the next returns `then`.
    pub fn failing_once_then(then: ChargeOutcome) -> Self {
        Self {
            script: Mutex::new(vec![
                ScriptStep::TransportError("connection timed out".to_string()),
                ScriptStep::Outcome(then),
            ]),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every charge request seen, in order.
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BasePaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome> {
        self.requests.lock().unwrap().push(request);

        let step = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };

        match step {
            None => Ok(ChargeOutcome::Succeeded {
                payment_ref: "pi_mock".to_string(),
            }),
            Some(ScriptStep::Outcome(outcome)) => Ok(outcome),
            Some(ScriptStep::TransportError(message)) => Err(anyhow!(message)),
        }
    }
}

// =============================================================================
// Mock Messaging Transports
// =============================================================================

pub struct MockEmailSender {
    sent: Mutex<Vec<OutboundEmail>>,
    fail_with: Option<String>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Every send fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEmailSender for MockEmailSender {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{}", message));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct MockSmsSender {
    sent: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

impl MockSmsSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    /// (recipient, body) pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockSmsSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSmsSender for MockSmsSender {
    async fn send(&self, recipient: &str, body: &str) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{}", message));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Passthrough Ranker
// =============================================================================

/// Keeps candidates in their incoming order, for deterministic cascade tests.
pub struct PassthroughRanker;

#[async_trait]
impl CandidateRanker for PassthroughRanker {
    async fn order(&self, _lead_zip: &str, candidates: Vec<Provider>) -> Vec<Provider> {
        candidates
    }
}

// =============================================================================
// In-Memory Lead Transitions
// =============================================================================

/// Lead state map with the same conditional-transition semantics as the
/// `leads` table: a lead leaves OPEN exactly once.
pub struct InMemoryLeadTransitions {
    state: Mutex<HashMap<LeadId, (LeadStatus, Option<ProviderId>)>>,
}

impl InMemoryLeadTransitions {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Status after the last transition, `None` if the lead was never moved.
    pub fn status_of(&self, lead_id: LeadId) -> Option<LeadStatus> {
        self.state.lock().unwrap().get(&lead_id).map(|(s, _)| *s)
    }

    pub fn routed_to(&self, lead_id: LeadId) -> Option<ProviderId> {
        self.state
            .lock()
            .unwrap()
            .get(&lead_id)
            .and_then(|(_, p)| *p)
    }
}

impl Default for InMemoryLeadTransitions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadTransitions for InMemoryLeadTransitions {
    async fn mark_delivered(&self, lead_id: LeadId, provider_id: ProviderId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.get(&lead_id) {
            Some((status, _)) if *status != LeadStatus::Open => Ok(false),
            _ => {
                state.insert(lead_id, (LeadStatus::Delivered, Some(provider_id)));
                Ok(true)
            }
        }
    }

    async fn mark_unserved(&self, lead_id: LeadId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.get(&lead_id) {
            Some((status, _)) if *status != LeadStatus::Open => Ok(false),
            _ => {
                state.insert(lead_id, (LeadStatus::Unserved, None));
                Ok(true)
            }
        }
    }
}

// =============================================================================
// In-Memory Charge Log
// =============================================================================

#[derive(Debug, Clone)]
pub struct ChargeRecord {
    pub id: ChargeAttemptId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub ordinal: i32,
    pub idempotency_key: String,
    pub amount_cents: i32,
    pub succeeded: Option<bool>,
    pub declined_reason: Option<String>,
}

pub struct InMemoryChargeLog {
    records: Mutex<Vec<ChargeRecord>>,
}

impl InMemoryChargeLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<ChargeRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| r.succeeded == Some(true))
            .count()
    }

    pub fn declines(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| r.succeeded == Some(false))
            .count()
    }

    pub fn decline_reasons(&self) -> Vec<String> {
        self.records()
            .iter()
            .filter_map(|r| r.declined_reason.clone())
            .collect()
    }
}

impl Default for InMemoryChargeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChargeLog for InMemoryChargeLog {
    async fn begin_attempt(
        &self,
        lead_id: LeadId,
        provider_id: ProviderId,
        amount_cents: i32,
    ) -> Result<ChargeAttemptRef> {
        let mut records = self.records.lock().unwrap();
        let ordinal = records.iter().filter(|r| r.lead_id == lead_id).count() as i32 + 1;
        let record = ChargeRecord {
            id: ChargeAttemptId::new(),
            lead_id,
            provider_id,
            ordinal,
            idempotency_key: idempotency_key(lead_id, provider_id, ordinal),
            amount_cents,
            succeeded: None,
            declined_reason: None,
        };
        let attempt_ref = ChargeAttemptRef {
            id: record.id,
            ordinal,
            idempotency_key: record.idempotency_key.clone(),
        };
        records.push(record);
        Ok(attempt_ref)
    }

    async fn record_success(&self, id: ChargeAttemptId) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.succeeded = Some(true);
        }
        Ok(())
    }

    async fn record_decline(&self, id: ChargeAttemptId, reason: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.succeeded = Some(false);
            record.declined_reason = Some(reason.to_string());
        }
        Ok(())
    }
}

// =============================================================================
// In-Memory Outbox
// =============================================================================

/// Outbox over a Vec, mirroring the Postgres queue's semantics: claims
/// increment the attempt counter, finalization only moves QUEUED rows.
pub struct InMemoryOutbox {
    rows: Mutex<Vec<NotificationAttempt>>,
    max_attempts: i32,
}

impl InMemoryOutbox {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            max_attempts,
        }
    }

    pub fn all(&self) -> Vec<NotificationAttempt> {
        self.rows.lock().unwrap().clone()
    }

    pub fn status_of(&self, id: NotificationId) -> Option<AttemptStatus> {
        self.all().iter().find(|a| a.id == id).map(|a| a.status)
    }

    pub fn error_of(&self, id: NotificationId) -> Option<String> {
        self.all().iter().find(|a| a.id == id).and_then(|a| a.error.clone())
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<NotificationAttempt> {
        let kind = kind.to_string();
        self.all().into_iter().filter(|a| a.kind == kind).collect()
    }

    pub fn count_of_kind(&self, kind: NotificationKind) -> usize {
        self.of_kind(kind).len()
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryOutbox {
    async fn enqueue(&self, message: OutboxMessage) -> Result<NotificationId> {
        let attempt = NotificationAttempt {
            id: NotificationId::new(),
            lead_id: message.lead_id,
            provider_id: message.provider_id,
            channel: message.channel,
            kind: message.kind.to_string(),
            payload: serde_json::to_value(&message.payload)?,
            status: AttemptStatus::Queued,
            attempts: 0,
            max_attempts: self.max_attempts,
            error: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        let id = attempt.id;
        self.rows.lock().unwrap().push(attempt);
        Ok(id)
    }

    async fn claim_batch(&self, limit: i64) -> Result<Vec<NotificationAttempt>> {
        let mut rows = self.rows.lock().unwrap();
        let mut claimed = Vec::new();
        for row in rows.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if row.status == AttemptStatus::Queued && row.attempts < row.max_attempts {
                row.attempts += 1;
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, id: NotificationId) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|a| a.id == id && a.status == AttemptStatus::Queued)
        {
            Some(row) => {
                row.status = AttemptStatus::Sent;
                row.sent_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(&self, id: NotificationId, error: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|a| a.id == id && a.status == AttemptStatus::Queued)
        {
            Some(row) => {
                row.status = AttemptStatus::Failed;
                row.error = Some(error.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::notifications::models::AttemptChannel;

    fn message() -> OutboxMessage {
        let payload = payload_fixture("provider@example.test");
        OutboxMessage {
            lead_id: payload.lead.id,
            provider_id: None,
            channel: AttemptChannel::Email,
            kind: NotificationKind::FeaturedLead,
            payload,
        }
    }

    #[tokio::test]
    async fn attempts_only_move_queued_to_terminal() {
        let outbox = InMemoryOutbox::new(3);
        let id = outbox.enqueue(message()).await.unwrap();

        assert!(outbox.mark_sent(id).await.unwrap());
        assert_eq!(outbox.status_of(id), Some(AttemptStatus::Sent));

        // Terminal rows never transition again
        assert!(!outbox.mark_failed(id, "late failure").await.unwrap());
        assert!(!outbox.mark_sent(id).await.unwrap());
        assert_eq!(outbox.status_of(id), Some(AttemptStatus::Sent));

        // Rows are appended, never deleted
        assert_eq!(outbox.all().len(), 1);
    }

    #[tokio::test]
    async fn claims_stop_once_retry_budget_is_spent() {
        let outbox = InMemoryOutbox::new(2);
        outbox.enqueue(message()).await.unwrap();

        assert_eq!(outbox.claim_batch(10).await.unwrap().len(), 1);
        assert_eq!(outbox.claim_batch(10).await.unwrap().len(), 1);
        // Budget of 2 spent, still QUEUED but no longer claimable
        assert_eq!(outbox.claim_batch(10).await.unwrap().len(), 0);
    }
}
