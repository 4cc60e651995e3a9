//! Direct pay-per-lead pricing.
//!
//! Fixed table, no surge or discount logic: the price is computed once at
//! lead creation and charged verbatim by the dispatch engine.

use crate::domains::leads::Urgency;

/// Standard-urgency lead price, in cents ($20.00).
pub const STANDARD_PRICE_CENTS: i32 = 2000;

/// STAT-urgency lead price, in cents ($50.00).
pub const STAT_PRICE_CENTS: i32 = 5000;

pub fn price_for(urgency: Urgency) -> i32 {
    match urgency {
        Urgency::Standard => STANDARD_PRICE_CENTS,
        Urgency::Stat => STAT_PRICE_CENTS,
    }
}

/// "$20.00"-style display for message composition.
pub fn format_price(cents: i32) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_table() {
        assert_eq!(price_for(Urgency::Standard), 2000);
        assert_eq!(price_for(Urgency::Stat), 5000);
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(2000), "$20.00");
        assert_eq!(format_price(5000), "$50.00");
        assert_eq!(format_price(1), "$0.01");
    }
}
