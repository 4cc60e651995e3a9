// Thin client for the SendGrid v3 Mail Send API.
// https://www.twilio.com/docs/sendgrid/api-reference/mail-send/mail-send

use std::time::Duration;

pub mod models;
use reqwest::Client;

pub use crate::models::MailMessage;

#[derive(Debug, Clone)]
pub struct SendGridOptions {
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct SendGridService {
    options: SendGridOptions,
    client: Client,
}

impl SendGridService {
    pub fn new(options: SendGridOptions) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { options, client }
    }

    /// Send a single email. SendGrid answers 202 Accepted on success.
    pub async fn send(&self, message: &MailMessage) -> Result<(), String> {
        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.options.api_key)
            .json(&message.to_payload())
            .send()
            .await
            .map_err(|e| format!("request to SendGrid failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(format!("SendGrid returned {}: {}", status, body))
    }
}
