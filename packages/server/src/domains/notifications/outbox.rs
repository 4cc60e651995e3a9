//! Notification outbox seam.
//!
//! Enqueuers (the dispatch engine, the broadcast notifier, the intake route)
//! append `QUEUED` attempt rows through [`NotificationOutbox`]; the worker
//! claims and finalizes them. Message context is snapshotted into the row's
//! payload at enqueue time, so delivery needs no further lookups.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{LeadId, NotificationId, ProviderId};
use crate::domains::leads::{Lead, Urgency};
use crate::domains::notifications::models::{AttemptChannel, NotificationAttempt, NotificationKind};

/// Lead fields frozen into a notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadSnapshot {
    pub id: LeadId,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address1: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub urgency: Urgency,
    pub notes: Option<String>,
    pub price_cents: i32,
}

impl LeadSnapshot {
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            id: lead.id,
            full_name: lead.full_name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            address1: lead.address1.clone(),
            city: lead.city.clone(),
            state: lead.state.clone(),
            zip: lead.zip.clone(),
            urgency: lead.urgency,
            notes: lead.notes.clone(),
            price_cents: lead.price_cents,
        }
    }
}

/// Everything the worker needs to compose and send one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Email address or phone number, resolved at enqueue time.
    pub to: String,
    pub provider_name: Option<String>,
    pub lead: LeadSnapshot,
    /// Decline reason, for payment-failed notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Geocoded distance to the provider, for blast ordering and logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
}

/// One message to append to the outbox.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub lead_id: LeadId,
    pub provider_id: Option<ProviderId>,
    pub channel: AttemptChannel,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Append a `QUEUED` attempt row.
    async fn enqueue(&self, message: OutboxMessage) -> Result<NotificationId>;

    /// Claim up to `limit` deliverable rows, incrementing their counters.
    async fn claim_batch(&self, limit: i64) -> Result<Vec<NotificationAttempt>>;

    /// `QUEUED -> SENT`; false if the row was already terminal.
    async fn mark_sent(&self, id: NotificationId) -> Result<bool>;

    /// `QUEUED -> FAILED`; false if the row was already terminal.
    async fn mark_failed(&self, id: NotificationId, error: &str) -> Result<bool>;
}

/// Postgres-backed outbox over the `notification_attempts` table.
#[derive(Clone)]
pub struct PgOutbox {
    pool: PgPool,
    max_attempts: i32,
}

impl PgOutbox {
    pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[async_trait]
impl NotificationOutbox for PgOutbox {
    async fn enqueue(&self, message: OutboxMessage) -> Result<NotificationId> {
        let attempt =
            NotificationAttempt::create_queued(&message, self.max_attempts, &self.pool).await?;
        Ok(attempt.id)
    }

    async fn claim_batch(&self, limit: i64) -> Result<Vec<NotificationAttempt>> {
        NotificationAttempt::claim_batch(limit, &self.pool).await
    }

    async fn mark_sent(&self, id: NotificationId) -> Result<bool> {
        NotificationAttempt::mark_sent(id, &self.pool).await
    }

    async fn mark_failed(&self, id: NotificationId, error: &str) -> Result<bool> {
        NotificationAttempt::mark_failed(id, error, &self.pool).await
    }
}
