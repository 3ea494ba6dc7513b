//! Money helpers shared by the engine and the audit trail

use bigdecimal::BigDecimal;

/// Build an amount from a whole number of cents
pub fn from_cents(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), 2)
}

/// Render an amount with exactly two decimal places
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}
