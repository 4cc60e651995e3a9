use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::ProviderId;
use crate::domains::geo::distance::normalize_zip;
use crate::domains::providers::coverage;

/// Provider model - suppliers in the mobile blood-draw directory
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Provider {
    pub id: ProviderId,

    // Profile
    pub name: String,

    // Contact channels
    pub phone_public: Option<String>,
    pub email: Option<String>,
    pub claim_email: Option<String>,
    pub notification_email: Option<String>,

    // Coverage declaration
    /// Comma-separated coverage tokens (exact / `prefix*` / `LOW-HIGH`).
    pub zip_codes: Option<String>,
    pub service_radius_miles: Option<i32>,
    /// State abbreviations for state-level coverage (featured broadcast).
    pub coverage_states: Vec<String>,

    // Payment capability (both required to be charge-eligible)
    pub stripe_customer_id: Option<String>,
    pub stripe_payment_method_id: Option<String>,

    // Flags
    pub eligible_for_leads: bool,
    pub is_featured: bool,
    pub notify_enabled: bool,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a new provider
#[derive(Debug, Clone, Default)]
pub struct CreateProvider {
    pub name: String,
    pub phone_public: Option<String>,
    pub email: Option<String>,
    pub claim_email: Option<String>,
    pub notification_email: Option<String>,
    pub zip_codes: Option<String>,
    pub service_radius_miles: Option<i32>,
    pub coverage_states: Vec<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_payment_method_id: Option<String>,
    pub eligible_for_leads: bool,
    pub is_featured: bool,
    pub notify_enabled: bool,
}

impl Provider {
    /// Preferred address for lead email, by priority:
    /// notification email > claim email > plain email.
    pub fn notification_recipient(&self) -> Option<&str> {
        self.notification_email
            .as_deref()
            .or(self.claim_email.as_deref())
            .or(self.email.as_deref())
            .filter(|e| !e.is_empty())
    }

    /// First declared coverage ZIP, normalized. Anchor for radius matching.
    pub fn primary_zip(&self) -> Option<String> {
        let zips = self.zip_codes.as_deref()?;
        coverage::coverage_tokens(zips).next().map(normalize_zip)
    }

    /// Both Stripe references saved, so the provider can be charged.
    pub fn has_payment_method(&self) -> bool {
        self.stripe_customer_id.is_some() && self.stripe_payment_method_id.is_some()
    }

    /// Whether the coverage declaration matches the lead ZIP.
    pub fn covers_zip(&self, zip: &str) -> bool {
        self.zip_codes
            .as_deref()
            .map(|tokens| coverage::covers_zip(tokens, zip))
            .unwrap_or(false)
    }

    /// Whether the provider declares state-level coverage for `state`.
    pub fn covers_state(&self, state: &str) -> bool {
        self.coverage_states.iter().any(|s| s == state)
    }

    /// Find provider by ID, returning None if not found
    pub async fn find_by_id_optional(id: ProviderId, pool: &PgPool) -> Result<Option<Self>> {
        let provider = sqlx::query_as::<_, Self>("SELECT * FROM providers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(provider)
    }

    /// Roster for the charge cascade: saved payment method + declared coverage.
    /// ZIP filtering happens in application code against the token grammar.
    pub async fn find_charge_candidates(pool: &PgPool) -> Result<Vec<Self>> {
        let providers = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM providers
            WHERE stripe_customer_id IS NOT NULL
              AND stripe_payment_method_id IS NOT NULL
              AND zip_codes IS NOT NULL
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    /// Roster for the SMS blast: opted in, reachable by phone, has coverage.
    pub async fn find_sms_eligible(pool: &PgPool) -> Result<Vec<Self>> {
        let providers = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM providers
            WHERE eligible_for_leads = true
              AND phone_public IS NOT NULL
              AND zip_codes IS NOT NULL
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    /// Roster for the featured email broadcast pilot.
    pub async fn find_featured_notifiable(pool: &PgPool) -> Result<Vec<Self>> {
        let providers = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM providers
            WHERE is_featured = true
              AND notify_enabled = true
              AND zip_codes IS NOT NULL
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    /// Create a new provider
    pub async fn create(input: CreateProvider, pool: &PgPool) -> Result<Self> {
        let provider = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO providers (
                name, phone_public, email, claim_email, notification_email,
                zip_codes, service_radius_miles, coverage_states,
                stripe_customer_id, stripe_payment_method_id,
                eligible_for_leads, is_featured, notify_enabled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.phone_public)
        .bind(&input.email)
        .bind(&input.claim_email)
        .bind(&input.notification_email)
        .bind(&input.zip_codes)
        .bind(input.service_radius_miles)
        .bind(&input.coverage_states)
        .bind(&input.stripe_customer_id)
        .bind(&input.stripe_payment_method_id)
        .bind(input.eligible_for_leads)
        .bind(input.is_featured)
        .bind(input.notify_enabled)
        .fetch_one(pool)
        .await?;
        Ok(provider)
    }

    /// Save a provider's Stripe customer/payment-method pair.
    pub async fn save_payment_method(
        id: ProviderId,
        customer_id: &str,
        payment_method_id: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        let provider = sqlx::query_as::<_, Self>(
            r#"
            UPDATE providers SET
                stripe_customer_id = $2,
                stripe_payment_method_id = $3,
                eligible_for_leads = true
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(payment_method_id)
        .fetch_one(pool)
        .await?;
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::provider_fixture;

    #[test]
    fn recipient_prefers_notification_email() {
        let mut provider = provider_fixture("Acme Mobile Draws", "90210");
        provider.email = Some("plain@acme.test".into());
        provider.claim_email = Some("claim@acme.test".into());
        provider.notification_email = Some("notify@acme.test".into());
        assert_eq!(provider.notification_recipient(), Some("notify@acme.test"));

        provider.notification_email = None;
        assert_eq!(provider.notification_recipient(), Some("claim@acme.test"));

        provider.claim_email = None;
        assert_eq!(provider.notification_recipient(), Some("plain@acme.test"));

        provider.email = None;
        assert_eq!(provider.notification_recipient(), None);
    }

    #[test]
    fn primary_zip_is_first_token_normalized() {
        let mut provider = provider_fixture("Acme Mobile Draws", "90210");
        provider.zip_codes = Some(" 90210-1234 , 902*".into());
        assert_eq!(provider.primary_zip().as_deref(), Some("90210"));

        provider.zip_codes = None;
        assert_eq!(provider.primary_zip(), None);
    }
}
