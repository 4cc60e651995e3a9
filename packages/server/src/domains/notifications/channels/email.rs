use crate::domains::leads::pricing::format_price;
use crate::domains::notifications::channels::MessagingConfig;
use crate::domains::notifications::outbox::NotificationPayload;
use crate::kernel::OutboundEmail;

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Charge succeeded: full patient details for the provider who paid.
pub fn lead_delivered(payload: &NotificationPayload, config: &MessagingConfig) -> OutboundEmail {
    let lead = &payload.lead;
    let subject = format!(
        "New Patient Lead ({}) - {}, {}",
        lead.urgency, lead.city, lead.state
    );
    let text = format!(
        "You have a new patient lead!\n\n\
         Name: {}\nPhone: {}\nEmail: {}\nAddress: {}\n\
         City: {}\nState: {}\nZIP: {}\nUrgency: {}\nNotes: {}\n\n\
         Lead Price: {}\n\n\
         Please contact this patient as soon as possible.",
        lead.full_name,
        lead.phone,
        or_dash(&lead.email),
        or_dash(&lead.address1),
        lead.city,
        lead.state,
        lead.zip,
        lead.urgency,
        or_dash(&lead.notes),
        format_price(lead.price_cents),
    );
    let html = format!(
        "<h2>New Patient Lead!</h2>\
         <p><strong>Urgency:</strong> {}</p><hr/>\
         <p><strong>Name:</strong> {}</p>\
         <p><strong>Phone:</strong> {}</p>\
         <p><strong>City:</strong> {}, {} {}</p>\
         <p><strong>Notes:</strong> {}</p><hr/>\
         <p><strong>Lead Price:</strong> {}</p>\
         <p><em>Please contact this patient as soon as possible.</em></p>",
        lead.urgency,
        lead.full_name,
        lead.phone,
        lead.city,
        lead.state,
        lead.zip,
        or_dash(&lead.notes),
        format_price(lead.price_cents),
    );

    OutboundEmail {
        to: payload.to.clone(),
        from: config.from_address.clone(),
        subject,
        text,
        html: Some(html),
    }
}

/// Charge declined: the provider missed this lead and should fix their card.
pub fn payment_failed(payload: &NotificationPayload, config: &MessagingConfig) -> OutboundEmail {
    let lead = &payload.lead;
    let reason = payload.error.as_deref().unwrap_or("unknown");
    let subject = format!("Payment failed - lead missed in {}, {}", lead.city, lead.state);
    let text = format!(
        "Your payment method was declined for a new lead, so the lead was \
         routed to another provider.\n\n\
         Lead details:\nLocation: {}, {} {}\nUrgency: {}\nPrice: {}\n\n\
         Error: {}\n\n\
         Please update your payment method to avoid missing future leads:\n\
         {}/dashboard",
        lead.city,
        lead.state,
        lead.zip,
        lead.urgency,
        format_price(lead.price_cents),
        reason,
        config.public_site_url,
    );

    OutboundEmail {
        to: payload.to.clone(),
        from: config.from_address.clone(),
        subject,
        text,
        html: None,
    }
}

/// Operator alert: nobody could be charged for this lead.
pub fn admin_unserved(payload: &NotificationPayload, config: &MessagingConfig) -> OutboundEmail {
    let lead = &payload.lead;
    let subject = format!("Unserved lead - recruit provider in {}", lead.zip);
    let text = format!(
        "A lead could not be routed to any provider.\n\n\
         Lead ID: {}\nZIP: {}\nCity: {}, {}\nUrgency: {}\n\n\
         Consider recruiting providers in this area.",
        lead.id, lead.zip, lead.city, lead.state, lead.urgency,
    );

    OutboundEmail {
        to: payload.to.clone(),
        from: config.from_address.clone(),
        subject,
        text,
        html: None,
    }
}

/// Featured pilot: heads-up that a request may match the provider's area.
pub fn featured_lead(payload: &NotificationPayload, config: &MessagingConfig) -> OutboundEmail {
    let lead = &payload.lead;
    let name = payload.provider_name.as_deref().unwrap_or("there");
    let dashboard_url = format!("{}/dashboard", config.public_site_url);
    let notes_short: String = lead.notes.as_deref().unwrap_or("None").chars().take(200).collect();

    let text = format!(
        "Hi {},\n\n\
         A new mobile phlebotomy request may match your coverage area.\n\n\
         Location: {}, {} {}\nUrgency: {}\nNotes: {}\n\n\
         Review the request here:\n{}\n\n\
         No action is required if you're unavailable.",
        name, lead.city, lead.state, lead.zip, lead.urgency, notes_short, dashboard_url,
    );
    let html = format!(
        "<p>Hi {},</p>\
         <p>A new mobile phlebotomy request may match your coverage area.</p>\
         <p><strong>Location:</strong> {}, {} {}<br/>\
         <strong>Urgency:</strong> {}<br/>\
         <strong>Notes:</strong> {}</p>\
         <p><a href=\"{}\">Review Request</a></p>\
         <p>No action is required if you're unavailable.</p>",
        name, lead.city, lead.state, lead.zip, lead.urgency, notes_short, dashboard_url,
    );

    OutboundEmail {
        to: payload.to.clone(),
        from: config.from_address.clone(),
        subject: "New mobile phlebotomy request in your area".to_string(),
        text,
        html: Some(html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::payload_fixture;

    fn config() -> MessagingConfig {
        MessagingConfig {
            from_address: "noreply@mobilephlebotomy.org".into(),
            public_site_url: "https://mobilephlebotomy.org".into(),
        }
    }

    #[test]
    fn delivered_email_carries_contact_details_and_price() {
        let email = lead_delivered(&payload_fixture("provider@example.test"), &config());
        assert!(email.subject.contains("New Patient Lead"));
        assert!(email.text.contains("$20.00"));
        assert!(email.text.contains("90210"));
        assert!(email.html.is_some());
    }

    #[test]
    fn payment_failed_email_names_the_decline_reason() {
        let mut payload = payload_fixture("provider@example.test");
        payload.error = Some("card_declined".into());
        let email = payment_failed(&payload, &config());
        assert!(email.text.contains("card_declined"));
        assert!(email.text.contains("/dashboard"));
    }

    #[test]
    fn admin_alert_names_zip_and_urgency() {
        let email = admin_unserved(&payload_fixture("ops@example.test"), &config());
        assert!(email.subject.contains("90210"));
        assert!(email.text.contains("STANDARD"));
    }
}
