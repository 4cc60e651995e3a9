use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{LeadId, ProviderId};

/// Requested urgency for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_urgency", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Standard,
    Stat,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Standard => write!(f, "STANDARD"),
            Urgency::Stat => write!(f, "STAT"),
        }
    }
}

/// Lead lifecycle. A lead leaves `Open` exactly once; both other states are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    Open,
    Delivered,
    Unserved,
}

/// Lead model - one incoming blood-draw request
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: LeadId,

    // Contact
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,

    // Location
    pub address1: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,

    pub urgency: Urgency,
    pub notes: Option<String>,

    /// Assigned once at creation from the pricing table.
    pub price_cents: i32,
    pub source: String,

    // Routing (set only by the dispatch engine)
    pub status: LeadStatus,
    pub routed_to_id: Option<ProviderId>,
    pub routed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a new lead
#[derive(Debug, Clone)]
pub struct CreateLead {
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
    pub source: String,
}

impl Lead {
    pub async fn find_by_id_optional(id: LeadId, pool: &PgPool) -> Result<Option<Self>> {
        let lead = sqlx::query_as::<_, Self>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(lead)
    }

    /// Create a new lead in `OPEN`.
    pub async fn create(input: CreateLead, pool: &PgPool) -> Result<Self> {
        let lead = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO leads (
                full_name, phone, email, address1, city, state, zip,
                urgency, notes, price_cents, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&input.full_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address1)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(input.urgency)
        .bind(&input.notes)
        .bind(input.price_cents)
        .bind(&input.source)
        .fetch_one(pool)
        .await?;
        Ok(lead)
    }

    /// Transition `OPEN -> DELIVERED` and record the routed provider.
    ///
    /// Conditional on the row still being `OPEN`, so concurrent invocations
    /// for the same lead cannot both claim it. Returns whether this call won
    /// the transition.
    pub async fn mark_delivered(id: LeadId, provider_id: ProviderId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leads SET
                status = 'DELIVERED',
                routed_to_id = $2,
                routed_at = NOW()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .bind(provider_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Transition `OPEN -> UNSERVED`. Same conditional-update contract as
    /// [`Lead::mark_delivered`].
    pub async fn mark_unserved(id: LeadId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE leads SET status = 'UNSERVED' WHERE id = $1 AND status = 'OPEN'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Routing counters for a provider's dashboard.
    pub async fn count_routed_to(provider_id: ProviderId, pool: &PgPool) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leads WHERE routed_to_id = $1")
                .bind(provider_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Urgency::Stat).unwrap(), "\"STAT\"");
        let parsed: Urgency = serde_json::from_str("\"STANDARD\"").unwrap();
        assert_eq!(parsed, Urgency::Standard);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&LeadStatus::Unserved).unwrap(),
            "\"UNSERVED\""
        );
        let parsed: LeadStatus = serde_json::from_str("\"DELIVERED\"").unwrap();
        assert_eq!(parsed, LeadStatus::Delivered);
    }
}
