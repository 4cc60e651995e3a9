pub mod charge_attempt;

pub use charge_attempt::{idempotency_key, ChargeAttempt, ChargeStatus};
