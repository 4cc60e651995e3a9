// Kernel - infrastructure seams and their production wiring

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{SendGridEmailSender, ServerDeps, StripeGateway, TwilioSmsSender};
pub use traits::{
    BaseEmailSender, BaseGeocoder, BasePaymentGateway, BaseSmsSender, ChargeOutcome,
    ChargeRequest, OutboundEmail,
};
