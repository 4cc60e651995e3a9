//! Message composition per channel.
//!
//! Composers turn a queued payload into a ready-to-send email or SMS body.
//! They are pure; the outbox worker picks the composer from the attempt's
//! (kind, channel) pair.

pub mod email;
pub mod sms;

/// Sender identity and link bases shared by all composed messages.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub from_address: String,
    pub public_site_url: String,
}
