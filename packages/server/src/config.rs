use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub stripe_secret_key: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_messaging_service_sid: String,
    pub sendgrid_api_key: String,
    /// Sender address for all outbound lead email.
    pub lead_email_from: String,
    /// Operator address alerted when a lead ends up unserved.
    pub admin_email: Option<String>,
    pub public_site_url: String,
    /// Candidate ordering strategy: "random" or "nearest".
    pub candidate_ranker: String,
    /// Whether lead intake also triggers the SMS blast to nearby providers.
    pub sms_blast_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .context("STRIPE_SECRET_KEY must be set")?,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_messaging_service_sid: env::var("TWILIO_MESSAGING_SERVICE_SID")
                .context("TWILIO_MESSAGING_SERVICE_SID must be set")?,
            sendgrid_api_key: env::var("SENDGRID_API_KEY")
                .context("SENDGRID_API_KEY must be set")?,
            lead_email_from: env::var("LEAD_EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@mobilephlebotomy.org".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            public_site_url: env::var("PUBLIC_SITE_URL")
                .unwrap_or_else(|_| "https://mobilephlebotomy.org".to_string()),
            candidate_ranker: env::var("CANDIDATE_RANKER")
                .unwrap_or_else(|_| "random".to_string()),
            sms_blast_enabled: env::var("SMS_BLAST_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}
