use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{LeadId, NotificationId, ProviderId};
use crate::domains::notifications::outbox::OutboxMessage;

/// Delivery channel for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_channel", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttemptChannel {
    Email,
    Sms,
}

/// Attempt lifecycle. `Queued` rows are claimable by the worker; both other
/// states are terminal and reached exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptStatus {
    Queued,
    Sent,
    Failed,
}

/// Which composed message an attempt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Charge succeeded; the provider receives the patient details.
    LeadDelivered,
    /// Charge declined; the provider missed this lead.
    PaymentFailed,
    /// No provider could be charged; operator recruitment alert.
    AdminUnserved,
    /// Featured pilot fan-out email.
    FeaturedLead,
    /// Claim-flow SMS fan-out.
    SmsBlast,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::LeadDelivered => write!(f, "lead_delivered"),
            NotificationKind::PaymentFailed => write!(f, "payment_failed"),
            NotificationKind::AdminUnserved => write!(f, "admin_unserved"),
            NotificationKind::FeaturedLead => write!(f, "featured_lead"),
            NotificationKind::SmsBlast => write!(f, "sms_blast"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lead_delivered" => Ok(NotificationKind::LeadDelivered),
            "payment_failed" => Ok(NotificationKind::PaymentFailed),
            "admin_unserved" => Ok(NotificationKind::AdminUnserved),
            "featured_lead" => Ok(NotificationKind::FeaturedLead),
            "sms_blast" => Ok(NotificationKind::SmsBlast),
            _ => Err(anyhow::anyhow!("Invalid notification kind: {}", s)),
        }
    }
}

/// One delivery try. Append-only audit row and outbox entry in one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationAttempt {
    pub id: NotificationId,
    pub lead_id: LeadId,
    /// Null only for operator alerts.
    pub provider_id: Option<ProviderId>,
    pub channel: AttemptChannel,
    pub kind: String,
    /// Message context snapshotted at enqueue time.
    pub payload: serde_json::Value,
    pub status: AttemptStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationAttempt {
    /// Append a new `QUEUED` row for the worker to deliver.
    pub async fn create_queued(
        message: &OutboxMessage,
        max_attempts: i32,
        pool: &PgPool,
    ) -> Result<Self> {
        let payload = serde_json::to_value(&message.payload)?;
        let attempt = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO notification_attempts (
                lead_id, provider_id, channel, kind, payload, max_attempts
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(message.lead_id)
        .bind(message.provider_id)
        .bind(message.channel)
        .bind(message.kind.to_string())
        .bind(payload)
        .bind(max_attempts)
        .fetch_one(pool)
        .await?;
        Ok(attempt)
    }

    /// Claim up to `limit` queued rows with retry budget left, incrementing
    /// their attempt counter. `FOR UPDATE SKIP LOCKED` keeps concurrent
    /// workers from claiming the same row.
    pub async fn claim_batch(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let claimed = sqlx::query_as::<_, Self>(
            r#"
            UPDATE notification_attempts SET attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM notification_attempts
                WHERE status = 'QUEUED' AND attempts < max_attempts
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(claimed)
    }

    /// Finalize `QUEUED -> SENT`. Returns whether this call performed the
    /// transition; terminal rows are never updated.
    pub async fn mark_sent(id: NotificationId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_attempts SET status = 'SENT', sent_at = NOW()
            WHERE id = $1 AND status = 'QUEUED'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Finalize `QUEUED -> FAILED` with the transport error. Same
    /// conditional-update contract as [`NotificationAttempt::mark_sent`].
    pub async fn mark_failed(id: NotificationId, error: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_attempts SET status = 'FAILED', error = $2
            WHERE id = $1 AND status = 'QUEUED'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_lead(lead_id: LeadId, pool: &PgPool) -> Result<Vec<Self>> {
        let attempts = sqlx::query_as::<_, Self>(
            "SELECT * FROM notification_attempts WHERE lead_id = $1 ORDER BY created_at",
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
    use std::str::FromStr;

    #[test]
    fn kind_roundtrips_through_strings() {
        for kind in [
            NotificationKind::LeadDelivered,
            NotificationKind::PaymentFailed,
            NotificationKind::AdminUnserved,
            NotificationKind::FeaturedLead,
            NotificationKind::SmsBlast,
        ] {
            let parsed = NotificationKind::from_str(&kind.to_string()).unwrap();
            assert_eq!(parsed, kind);
        }
        assert!(NotificationKind::from_str("carrier_pigeon").is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&AttemptStatus::Queued).unwrap(),
            "\"QUEUED\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptChannel::Sms).unwrap(),
            "\"sms\""
        );
    }
}
