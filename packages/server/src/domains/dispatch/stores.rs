//! Postgres implementations of the engine's storage seams.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::common::{ChargeAttemptId, LeadId, ProviderId};
use crate::domains::dispatch::engine::{ChargeAttemptRef, ChargeLog, LeadTransitions};
use crate::domains::dispatch::models::ChargeAttempt;
use crate::domains::leads::Lead;

/// Lead state transitions backed by conditional `leads` updates.
#[derive(Clone)]
pub struct PgLeadTransitions {
    pool: PgPool,
}

impl PgLeadTransitions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadTransitions for PgLeadTransitions {
    async fn mark_delivered(&self, lead_id: LeadId, provider_id: ProviderId) -> Result<bool> {
        Lead::mark_delivered(lead_id, provider_id, &self.pool).await
    }

    async fn mark_unserved(&self, lead_id: LeadId) -> Result<bool> {
        Lead::mark_unserved(lead_id, &self.pool).await
    }
}

/// Charge audit log backed by the `charge_attempts` table.
#[derive(Clone)]
pub struct PgChargeLog {
    pool: PgPool,
}

impl PgChargeLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChargeLog for PgChargeLog {
    async fn begin_attempt(
        &self,
        lead_id: LeadId,
        provider_id: ProviderId,
        amount_cents: i32,
    ) -> Result<ChargeAttemptRef> {
        let attempt = ChargeAttempt::begin(lead_id, provider_id, amount_cents, &self.pool).await?;
        Ok(ChargeAttemptRef {
            id: attempt.id,
            ordinal: attempt.ordinal,
            idempotency_key: attempt.idempotency_key,
        })
    }

    async fn record_success(&self, id: ChargeAttemptId) -> Result<()> {
        ChargeAttempt::mark_succeeded(id, &self.pool).await
    }

    async fn record_decline(&self, id: ChargeAttemptId, reason: &str) -> Result<()> {
        ChargeAttempt::mark_declined(id, reason, &self.pool).await
    }
}
