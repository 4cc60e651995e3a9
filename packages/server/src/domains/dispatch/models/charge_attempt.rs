use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ChargeAttemptId, LeadId, ProviderId};

/// Charge attempt lifecycle: `Attempted` rows are finalized exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "charge_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeStatus {
    Attempted,
    Succeeded,
    Declined,
}

/// Derive the gateway idempotency key for one cascade step. Reprocessing a
/// lead replays the same keys, so the gateway cannot double-charge.
pub fn idempotency_key(lead_id: LeadId, provider_id: ProviderId, ordinal: i32) -> String {
    format!("lead:{}:provider:{}:attempt:{}", lead_id, provider_id, ordinal)
}

/// Audit row for one cascade charge attempt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChargeAttempt {
    pub id: ChargeAttemptId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    /// 1-based position in this lead's cascade.
    pub ordinal: i32,
    pub idempotency_key: String,
    pub amount_cents: i32,
    pub status: ChargeStatus,
    pub declined_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChargeAttempt {
    /// Append an `ATTEMPTED` row with the next ordinal for this lead.
    ///
    /// Attempts within one dispatch invocation are strictly sequential, so
    /// the max-plus-one ordinal is race-free there.
    pub async fn begin(
        lead_id: LeadId,
        provider_id: ProviderId,
        amount_cents: i32,
        pool: &PgPool,
    ) -> Result<Self> {
        let ordinal: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(ordinal), 0) + 1 FROM charge_attempts WHERE lead_id = $1",
        )
        .bind(lead_id)
        .fetch_one(pool)
        .await?;

        let attempt = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO charge_attempts (
                lead_id, provider_id, ordinal, idempotency_key, amount_cents
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(provider_id)
        .bind(ordinal)
        .bind(idempotency_key(lead_id, provider_id, ordinal))
        .bind(amount_cents)
        .fetch_one(pool)
        .await?;
        Ok(attempt)
    }

    pub async fn mark_succeeded(id: ChargeAttemptId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE charge_attempts SET status = 'SUCCEEDED' WHERE id = $1 AND status = 'ATTEMPTED'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_declined(id: ChargeAttemptId, reason: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE charge_attempts SET status = 'DECLINED', declined_reason = $2
            WHERE id = $1 AND status = 'ATTEMPTED'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_lead(lead_id: LeadId, pool: &PgPool) -> Result<Vec<Self>> {
        let attempts = sqlx::query_as::<_, Self>(
            "SELECT * FROM charge_attempts WHERE lead_id = $1 ORDER BY ordinal",
        )
        .bind(lead_id)
        .fetch_all(pool)
        .await?;
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_deterministic_per_step() {
        let lead = LeadId::new();
        let provider = ProviderId::new();

        let key = idempotency_key(lead, provider, 2);
        assert_eq!(key, format!("lead:{}:provider:{}:attempt:2", lead, provider));
        assert_eq!(key, idempotency_key(lead, provider, 2));
        assert_ne!(key, idempotency_key(lead, provider, 3));
    }
}
