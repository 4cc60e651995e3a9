//! Outbox worker: delivers queued notification attempts.
//!
//! Long-running poll loop. Each pass claims a batch of `QUEUED` rows,
//! composes the message for each from its snapshotted payload, sends it over
//! the right transport, and finalizes the row. Send failures leave the row
//! `QUEUED` until its retry budget runs out, then it is finalized `FAILED`.
//! Nothing here can roll back a charge or a lead-status transition.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domains::notifications::channels::{email, sms, MessagingConfig};
use crate::domains::notifications::models::{AttemptChannel, NotificationAttempt, NotificationKind};
use crate::domains::notifications::outbox::{NotificationOutbox, NotificationPayload};
use crate::kernel::{BaseEmailSender, BaseSmsSender};

/// Configuration for the outbox worker.
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    /// Maximum rows to claim per pass.
    pub batch_size: i64,
    /// Sleep between passes when the queue is drained.
    pub poll_interval: Duration,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            poll_interval: Duration::from_secs(5),
        }
    }
}

pub struct OutboxWorker {
    outbox: Arc<dyn NotificationOutbox>,
    email: Arc<dyn BaseEmailSender>,
    sms: Arc<dyn BaseSmsSender>,
    messaging: MessagingConfig,
    config: OutboxWorkerConfig,
}

impl OutboxWorker {
    pub fn new(
        outbox: Arc<dyn NotificationOutbox>,
        email: Arc<dyn BaseEmailSender>,
        sms: Arc<dyn BaseSmsSender>,
        messaging: MessagingConfig,
        config: OutboxWorkerConfig,
    ) -> Self {
        Self {
            outbox,
            email,
            sms,
            messaging,
            config,
        }
    }

    /// Run until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(batch_size = self.config.batch_size, "Outbox worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Outbox worker shutting down");
                    return;
                }
                result = self.process_batch() => {
                    match result {
                        // Keep draining while there is work
                        Ok(delivered) if delivered > 0 => continue,
                        Ok(_) => {}
                        Err(error) => error!(%error, "Outbox batch failed"),
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }
    }

    /// Claim one batch and deliver every row in it. Returns how many rows
    /// were claimed.
    pub async fn process_batch(&self) -> Result<usize> {
        let claimed = self.outbox.claim_batch(self.config.batch_size).await?;
        let count = claimed.len();

        for attempt in claimed {
            self.deliver(&attempt).await;
        }

        Ok(count)
    }

    /// Deliver a single claimed attempt and finalize its row.
    async fn deliver(&self, attempt: &NotificationAttempt) {
        let sent = match self.send(attempt).await {
            Ok(()) => true,
            Err(error) => {
                if attempt.attempts >= attempt.max_attempts {
                    warn!(
                        attempt_id = %attempt.id,
                        kind = %attempt.kind,
                        %error,
                        "Notification failed, retry budget exhausted"
                    );
                    if let Err(error) = self.outbox.mark_failed(attempt.id, &error.to_string()).await
                    {
                        error!(attempt_id = %attempt.id, %error, "Failed to finalize attempt");
                    }
                } else {
                    debug!(
                        attempt_id = %attempt.id,
                        kind = %attempt.kind,
                        attempts = attempt.attempts,
                        %error,
                        "Notification failed, will retry"
                    );
                }
                false
            }
        };

        if sent {
            match self.outbox.mark_sent(attempt.id).await {
                Ok(true) => {}
                Ok(false) => warn!(attempt_id = %attempt.id, "Attempt was already finalized"),
                Err(error) => {
                    error!(attempt_id = %attempt.id, %error, "Failed to finalize attempt")
                }
            }
        }
    }

    /// Compose and send over the attempt's channel.
    async fn send(&self, attempt: &NotificationAttempt) -> Result<()> {
        let kind = NotificationKind::from_str(&attempt.kind)?;
        let payload: NotificationPayload = serde_json::from_value(attempt.payload.clone())?;

        match (kind, attempt.channel) {
            (NotificationKind::LeadDelivered, AttemptChannel::Email) => {
                self.email
                    .send(email::lead_delivered(&payload, &self.messaging))
                    .await
            }
            (NotificationKind::PaymentFailed, AttemptChannel::Email) => {
                self.email
                    .send(email::payment_failed(&payload, &self.messaging))
                    .await
            }
            (NotificationKind::AdminUnserved, AttemptChannel::Email) => {
                self.email
                    .send(email::admin_unserved(&payload, &self.messaging))
                    .await
            }
            (NotificationKind::FeaturedLead, AttemptChannel::Email) => {
                self.email
                    .send(email::featured_lead(&payload, &self.messaging))
                    .await
            }
            (NotificationKind::LeadDelivered, AttemptChannel::Sms) => {
                self.sms
                    .send(&payload.to, &sms::lead_delivered(&payload))
                    .await
            }
            (NotificationKind::SmsBlast, AttemptChannel::Sms) => {
                self.sms
                    .send(&payload.to, &sms::sms_blast(&payload, &self.messaging))
                    .await
            }
            (kind, channel) => Err(anyhow!(
                "no composer for kind {} on channel {:?}",
                kind,
                channel
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::LeadId;
    use crate::domains::notifications::models::AttemptStatus;
    use crate::domains::notifications::outbox::OutboxMessage;
    use crate::kernel::test_dependencies::{
        payload_fixture, InMemoryOutbox, MockEmailSender, MockSmsSender,
    };

    fn worker(
        outbox: Arc<InMemoryOutbox>,
        email: Arc<MockEmailSender>,
        sms: Arc<MockSmsSender>,
    ) -> OutboxWorker {
        OutboxWorker::new(
            outbox,
            email,
            sms,
            MessagingConfig {
                from_address: "noreply@mobilephlebotomy.org".into(),
                public_site_url: "https://mobilephlebotomy.org".into(),
            },
            OutboxWorkerConfig::default(),
        )
    }

    fn queued_email(kind: NotificationKind) -> OutboxMessage {
        let payload = payload_fixture("provider@example.test");
        OutboxMessage {
            lead_id: payload.lead.id,
            provider_id: None,
            channel: AttemptChannel::Email,
            kind,
            payload,
        }
    }

    #[tokio::test]
    async fn queued_attempt_transitions_to_sent() {
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let email = Arc::new(MockEmailSender::new());
        let sms = Arc::new(MockSmsSender::new());

        let id = outbox
            .enqueue(queued_email(NotificationKind::FeaturedLead))
            .await
            .unwrap();

        let worker = worker(outbox.clone(), email.clone(), sms);
        let claimed = worker.process_batch().await.unwrap();

        assert_eq!(claimed, 1);
        assert_eq!(outbox.status_of(id), Some(AttemptStatus::Sent));
        assert_eq!(email.sent().len(), 1);
        assert!(email.sent()[0].subject.contains("phlebotomy request"));
    }

    #[tokio::test]
    async fn failing_transport_retries_then_finalizes_failed() {
        let outbox = Arc::new(InMemoryOutbox::new(2));
        let email = Arc::new(MockEmailSender::failing("mailbox unavailable"));
        let sms = Arc::new(MockSmsSender::new());

        let id = outbox
            .enqueue(queued_email(NotificationKind::PaymentFailed))
            .await
            .unwrap();

        let worker = worker(outbox.clone(), email, sms);

        // First pass: failure within budget, row stays queued
        worker.process_batch().await.unwrap();
        assert_eq!(outbox.status_of(id), Some(AttemptStatus::Queued));

        // Second pass: budget exhausted, row finalized FAILED
        worker.process_batch().await.unwrap();
        assert_eq!(outbox.status_of(id), Some(AttemptStatus::Failed));
        assert!(outbox.error_of(id).unwrap().contains("mailbox unavailable"));

        // Terminal rows are never claimed again
        assert_eq!(worker.process_batch().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sms_attempts_go_through_the_sms_transport() {
        let outbox = Arc::new(InMemoryOutbox::new(3));
        let email = Arc::new(MockEmailSender::new());
        let sms = Arc::new(MockSmsSender::new());

        let payload = payload_fixture("+15551234567");
        outbox
            .enqueue(OutboxMessage {
                lead_id: LeadId::new(),
                provider_id: None,
                channel: AttemptChannel::Sms,
                kind: NotificationKind::SmsBlast,
                payload,
            })
            .await
            .unwrap();

        let worker = worker(outbox.clone(), email.clone(), sms.clone());
        worker.process_batch().await.unwrap();

        assert!(email.sent().is_empty());
        let messages = sms.sent();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "+15551234567");
        assert!(messages[0].1.contains("CLAIMED"));
    }
}
