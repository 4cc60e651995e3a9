//! Lead eligibility predicates.
//!
//! Three call sites filter the provider roster with different rules: the
//! charge cascade, the SMS blast, and the featured email broadcast. The
//! predicates are pure over already-loaded `Provider` rows (the SMS mode
//! additionally consults the geocoder for radius matching).

use crate::domains::geo::distance::within_radius;
use crate::domains::providers::Provider;
use crate::kernel::BaseGeocoder;

/// Charge-cascade eligibility: both Stripe references saved and the lead ZIP
/// covered by a declaration token.
pub fn charge_cascade_eligible(provider: &Provider, lead_zip: &str) -> bool {
    provider.has_payment_method() && provider.covers_zip(lead_zip)
}

/// SMS-broadcast eligibility: opted in, reachable by phone, and the lead ZIP
/// within the service radius of the provider's first declared ZIP, with an
/// explicit token match as the fallback when no radius applies.
pub async fn sms_broadcast_eligible(
    provider: &Provider,
    lead_zip: &str,
    geocoder: &dyn BaseGeocoder,
) -> bool {
    if !provider.eligible_for_leads || provider.phone_public.is_none() {
        return false;
    }

    // Radius check first
    if let (Some(primary_zip), Some(radius)) =
        (provider.primary_zip(), provider.service_radius_miles)
    {
        if within_radius(geocoder, &primary_zip, lead_zip, radius as f64).await {
            return true;
        }
    }

    provider.covers_zip(lead_zip)
}

/// Featured-broadcast eligibility: pilot flags on, a usable email, and either
/// state-level coverage or a token match. No radius fallback here.
pub fn featured_broadcast_eligible(provider: &Provider, lead_zip: &str, lead_state: &str) -> bool {
    if !provider.is_featured || !provider.notify_enabled {
        return false;
    }
    if provider.notification_recipient().is_none() {
        return false;
    }

    provider.covers_state(lead_state) || provider.covers_zip(lead_zip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{provider_fixture, StaticGeocoder};

    #[test]
    fn cascade_requires_payment_method_and_coverage() {
        // Provider covering the ZIP by wildcard but without a saved card
        let mut wildcard = provider_fixture("Wildcard Labs", "902*");
        wildcard.stripe_payment_method_id = None;
        assert!(!charge_cascade_eligible(&wildcard, "90210"));

        // Exact coverage with both Stripe references
        let exact = provider_fixture("Exact Draws", "90210");
        assert!(charge_cascade_eligible(&exact, "90210"));
        assert!(!charge_cascade_eligible(&exact, "90211"));
    }

    #[tokio::test]
    async fn sms_mode_includes_radius_matches() {
        let geocoder = StaticGeocoder::new()
            .with_zip("10001", 40.7506, -73.9971)
            .with_zip("10002", 40.7157, -73.9877);

        // Coverage declares only 10002, but a 25 mile radius reaches 10001
        let mut provider = provider_fixture("Downtown Draws", "10002");
        provider.service_radius_miles = Some(25);
        assert!(sms_broadcast_eligible(&provider, "10001", &geocoder).await);

        // Without the radius the token grammar decides
        provider.service_radius_miles = None;
        assert!(!sms_broadcast_eligible(&provider, "10001", &geocoder).await);

        // Not opted in
        provider.service_radius_miles = Some(25);
        provider.eligible_for_leads = false;
        assert!(!sms_broadcast_eligible(&provider, "10001", &geocoder).await);

        // No phone
        provider.eligible_for_leads = true;
        provider.phone_public = None;
        assert!(!sms_broadcast_eligible(&provider, "10001", &geocoder).await);
    }

    #[test]
    fn featured_mode_requires_flags_email_and_geography() {
        let mut provider = provider_fixture("Statewide Phlebotomy", "48201");
        provider.is_featured = true;
        provider.notify_enabled = true;
        provider.coverage_states = vec!["MI".into()];

        // State-level coverage matches regardless of ZIP tokens
        assert!(featured_broadcast_eligible(&provider, "49999", "MI"));
        // ZIP token match as the alternative
        assert!(featured_broadcast_eligible(&provider, "48201", "OH"));
        assert!(!featured_broadcast_eligible(&provider, "49999", "OH"));

        // Missing every email excludes the provider entirely
        provider.email = None;
        provider.claim_email = None;
        provider.notification_email = None;
        assert!(!featured_broadcast_eligible(&provider, "48201", "MI"));
    }
}
