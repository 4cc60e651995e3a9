//! Notifications domain - provider/admin messaging with an auditable outbox
//!
//! Every delivery try is a `NotificationAttempt` row: created `QUEUED`,
//! finalized `SENT` or `FAILED` by the outbox worker, never deleted. The
//! rows double as the delivery queue, so "fire-and-forget" sends are
//! observable and retryable instead of silently dropped.

pub mod broadcast;
pub mod channels;
pub mod models;
pub mod outbox;
pub mod worker;

pub use broadcast::BroadcastNotifier;
pub use models::{AttemptChannel, AttemptStatus, NotificationAttempt, NotificationKind};
pub use outbox::{LeadSnapshot, NotificationOutbox, NotificationPayload, OutboxMessage, PgOutbox};
pub use worker::{OutboxWorker, OutboxWorkerConfig};
