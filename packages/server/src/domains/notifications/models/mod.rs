pub mod attempt;

pub use attempt::{AttemptChannel, AttemptStatus, NotificationAttempt, NotificationKind};
