use crate::domains::leads::pricing::format_price;
use crate::domains::notifications::channels::MessagingConfig;
use crate::domains::notifications::outbox::NotificationPayload;

/// Charge succeeded: patient contact details, plus the reply keywords the
/// telephony webhook understands for out-of-band status updates.
pub fn lead_delivered(payload: &NotificationPayload) -> String {
    let lead = &payload.lead;
    format!(
        "New Lead: {}, ZIP {}, {}.\nCall: {}\n\
         Reply BOOKED, COMPLETED or DECLINED to update this lead. Reply STOP to opt-out.",
        lead.full_name, lead.zip, lead.urgency, lead.phone,
    )
}

/// Claim-flow blast: price and claim link, no patient contact details until
/// the lead is claimed.
pub fn sms_blast(payload: &NotificationPayload, config: &MessagingConfig) -> String {
    let lead = &payload.lead;
    let claim_url = format!("{}/claim/{}", config.public_site_url, lead.id);
    format!(
        "New request in {}, {}. Reply CLAIMED if you can contact and schedule \
         the patient now. Claim for {}: {}",
        lead.city,
        lead.state,
        format_price(lead.price_cents),
        claim_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::payload_fixture;

    #[test]
    fn blast_quotes_price_and_claim_link() {
        let config = MessagingConfig {
            from_address: "noreply@mobilephlebotomy.org".into(),
            public_site_url: "https://mobilephlebotomy.org".into(),
        };
        let payload = payload_fixture("+15551234567");
        let body = sms_blast(&payload, &config);
        assert!(body.contains("$20.00"));
        assert!(body.contains(&format!("/claim/{}", payload.lead.id)));
    }

    #[test]
    fn delivered_sms_includes_reply_keywords() {
        let body = lead_delivered(&payload_fixture("+15551234567"));
        assert!(body.contains("BOOKED"));
        assert!(body.contains("DECLINED"));
        assert!(body.contains("STOP"));
    }
}
