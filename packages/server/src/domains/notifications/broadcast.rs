//! Broadcast notifier: free fan-out paths, independent of the paid cascade.
//!
//! Two variants over different provider classes: the featured email pilot
//! (state-or-token match) and the claim-flow SMS blast (radius-or-token
//! match, closest providers messaged first). Each targeted provider gets one
//! `QUEUED` attempt row; providers excluded by eligibility get no row at all.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::domains::geo::distance_between_zips;
use crate::domains::leads::Lead;
use crate::domains::notifications::models::{AttemptChannel, NotificationKind};
use crate::domains::notifications::outbox::{
    LeadSnapshot, NotificationOutbox, NotificationPayload, OutboxMessage,
};
use crate::domains::providers::eligibility;
use crate::domains::providers::Provider;
use crate::kernel::BaseGeocoder;

pub struct BroadcastNotifier {
    outbox: Arc<dyn NotificationOutbox>,
    geocoder: Arc<dyn BaseGeocoder>,
}

impl BroadcastNotifier {
    pub fn new(outbox: Arc<dyn NotificationOutbox>, geocoder: Arc<dyn BaseGeocoder>) -> Self {
        Self { outbox, geocoder }
    }

    /// Featured providers matching the lead's state or ZIP, with their
    /// resolved recipient address. Providers without a usable email are
    /// excluded here, before any attempt row exists.
    pub fn featured_targets(lead: &Lead, roster: &[Provider]) -> Vec<(Provider, String)> {
        roster
            .iter()
            .filter(|p| eligibility::featured_broadcast_eligible(p, &lead.zip, &lead.state))
            .filter_map(|p| {
                p.notification_recipient()
                    .map(|email| (p.clone(), email.to_string()))
            })
            .collect()
    }

    /// Queue one featured-pilot email per matching provider. Returns how many
    /// notifications were queued.
    pub async fn notify_featured_providers(
        &self,
        lead: &Lead,
        roster: &[Provider],
    ) -> Result<usize> {
        let targets = Self::featured_targets(lead, roster);

        if targets.is_empty() {
            info!(lead_id = %lead.id, zip = %lead.zip, state = %lead.state,
                "No featured providers match this lead");
            return Ok(0);
        }

        info!(lead_id = %lead.id, count = targets.len(),
            "Queueing featured lead notifications");

        let mut queued = 0;
        for (provider, recipient) in targets {
            self.outbox
                .enqueue(OutboxMessage {
                    lead_id: lead.id,
                    provider_id: Some(provider.id),
                    channel: AttemptChannel::Email,
                    kind: NotificationKind::FeaturedLead,
                    payload: NotificationPayload {
                        to: recipient,
                        provider_name: Some(provider.name.clone()),
                        lead: LeadSnapshot::from_lead(lead),
                        error: None,
                        distance_miles: None,
                    },
                })
                .await?;
            queued += 1;
        }

        Ok(queued)
    }

    /// Log the would-be featured targets without queuing anything.
    pub fn featured_dry_run(lead: &Lead, roster: &[Provider]) {
        let targets = Self::featured_targets(lead, roster);
        info!(lead_id = %lead.id, count = targets.len(), "Featured broadcast dry run");
        for (provider, recipient) in targets {
            info!(provider_id = %provider.id, name = %provider.name, %recipient,
                "Would notify");
        }
    }

    /// Queue the claim-flow SMS blast. Matches are ordered by ascending
    /// geocoded distance from the lead before queuing; ordering affects
    /// message order and logging only, never eligibility.
    pub async fn sms_blast(&self, lead: &Lead, roster: &[Provider]) -> Result<usize> {
        let mut matches: Vec<(Provider, Option<f64>)> = Vec::new();
        for provider in roster {
            if eligibility::sms_broadcast_eligible(provider, &lead.zip, self.geocoder.as_ref())
                .await
            {
                let distance = match provider.primary_zip() {
                    Some(primary_zip) => {
                        distance_between_zips(self.geocoder.as_ref(), &lead.zip, &primary_zip)
                            .await?
                    }
                    None => None,
                };
                matches.push((provider.clone(), distance));
            }
        }

        if matches.is_empty() {
            info!(lead_id = %lead.id, zip = %lead.zip, "No providers eligible for SMS blast");
            return Ok(0);
        }

        // Closest first; unresolved distances sort last
        matches.sort_by(|a, b| {
            let da = a.1.unwrap_or(f64::MAX);
            let db = b.1.unwrap_or(f64::MAX);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(lead_id = %lead.id, count = matches.len(), "Queueing SMS blast");

        let mut queued = 0;
        for (provider, distance) in matches {
            // Eligibility already required a phone
            let Some(phone) = provider.phone_public.clone() else {
                continue;
            };
            debug!(provider_id = %provider.id, ?distance, "SMS blast target");
            self.outbox
                .enqueue(OutboxMessage {
                    lead_id: lead.id,
                    provider_id: Some(provider.id),
                    channel: AttemptChannel::Sms,
                    kind: NotificationKind::SmsBlast,
                    payload: NotificationPayload {
                        to: phone,
                        provider_name: Some(provider.name.clone()),
                        lead: LeadSnapshot::from_lead(lead),
                        error: None,
                        distance_miles: distance,
                    },
                })
                .await?;
            queued += 1;
        }

        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{
        lead_fixture, provider_fixture, InMemoryOutbox, StaticGeocoder,
    };

    fn featured(name: &str, state: &str) -> Provider {
        let mut provider = provider_fixture(name, "00000");
        provider.is_featured = true;
        provider.notify_enabled = true;
        provider.coverage_states = vec![state.to_string()];
        provider
    }

    #[tokio::test]
    async fn featured_broadcast_skips_providers_without_email() {
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let geocoder = Arc::new(StaticGeocoder::new());
        let notifier = BroadcastNotifier::new(outbox.clone(), geocoder);

        let lead = lead_fixture("90210", "CA");
        let mut no_email = featured("No Email Labs", "CA");
        no_email.email = None;
        no_email.claim_email = None;
        no_email.notification_email = None;

        let roster = vec![
            featured("Alpha Draws", "CA"),
            featured("Beta Draws", "CA"),
            no_email,
        ];

        let queued = notifier.notify_featured_providers(&lead, &roster).await.unwrap();

        // The email-less provider is excluded at eligibility, not FAILED
        assert_eq!(queued, 2);
        assert_eq!(outbox.all().len(), 2);
    }

    #[tokio::test]
    async fn sms_blast_orders_targets_closest_first() {
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_zip("10001", 40.7506, -73.9971)
                .with_zip("10002", 40.7157, -73.9877) // ~2.5 miles away
                .with_zip("11201", 40.6955, -73.9902), // ~4 miles away
        );
        let notifier = BroadcastNotifier::new(outbox.clone(), geocoder);

        let lead = lead_fixture("10001", "NY");

        let mut far = provider_fixture("Brooklyn Draws", "11201");
        far.phone_public = Some("+15550000002".into());
        far.service_radius_miles = Some(25);
        let mut near = provider_fixture("LES Draws", "10002");
        near.phone_public = Some("+15550000001".into());
        near.service_radius_miles = Some(25);

        let queued = notifier.sms_blast(&lead, &[far, near]).await.unwrap();
        assert_eq!(queued, 2);

        let rows = outbox.all();
        let recipients: Vec<String> = rows
            .iter()
            .map(|a| a.payload["to"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(recipients, vec!["+15550000001", "+15550000002"]);
    }

    #[tokio::test]
    async fn sms_blast_includes_radius_matches_without_token_coverage() {
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_zip("10001", 40.7506, -73.9971)
                .with_zip("10002", 40.7157, -73.9877),
        );
        let notifier = BroadcastNotifier::new(outbox.clone(), geocoder);

        // Covers only 10002 by token, but the 25 mile radius reaches 10001
        let mut provider = provider_fixture("Downtown Draws", "10002");
        provider.service_radius_miles = Some(25);

        let lead = lead_fixture("10001", "NY");
        let queued = notifier.sms_blast(&lead, &[provider]).await.unwrap();
        assert_eq!(queued, 1);
    }
}
