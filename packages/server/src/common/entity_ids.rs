//! Typed ID definitions for all domain entities.
//!
//! One marker type per entity, so the compiler rejects a `LeadId` where a
//! `ProviderId` is expected.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Lead entities (service requests).
pub struct Lead;

/// Marker type for Provider entities (service suppliers).
pub struct Provider;

/// Marker type for NotificationAttempt entities (delivery audit rows).
pub struct NotificationAttempt;

/// Marker type for ChargeAttempt entities (cascade charge audit rows).
pub struct ChargeAttempt;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Lead entities.
pub type LeadId = Id<Lead>;

/// Typed ID for Provider entities.
pub type ProviderId = Id<Provider>;

/// Typed ID for NotificationAttempt entities.
pub type NotificationId = Id<NotificationAttempt>;

/// Typed ID for ChargeAttempt entities.
pub type ChargeAttemptId = Id<ChargeAttempt>;
