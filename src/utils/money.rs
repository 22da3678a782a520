// utils/money.rs
//
// Fee, tax and commission math. Pure functions of amount and configuration
// so they can be unit tested in isolation.

use crate::config::{FeeSchedule, TaxationConfig};
use crate::models::Currency;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentFees {
    pub fees: i64,
    pub taxes: i64,
    pub net_amount: i64,
}

/// `fees = fixed + min(amount * pct, max_fee)`, VAT applied on the fees,
/// `net_amount = amount + fees + taxes`. All rounded to whole XAF.
pub fn calculate_payment_fees(
    amount: i64,
    schedule: &FeeSchedule,
    taxation: &TaxationConfig,
) -> PaymentFees {
    let percentage_fee = (amount as f64 * schedule.percentage / 100.0).min(schedule.max_fee as f64);
    let fees = (schedule.fixed as f64 + percentage_fee).round() as i64;
    let taxes = (fees as f64 * taxation.vat_rate).round() as i64;
    let net_amount = amount + fees + taxes;

    PaymentFees {
        fees,
        taxes,
        net_amount,
    }
}

pub fn calculate_merchant_commission(amount: i64, taxation: &TaxationConfig) -> i64 {
    (amount as f64 * taxation.commission_rate).round() as i64
}

/// Render an amount as a grouped integer with the currency suffix,
/// e.g. `50 000 XAF`.
pub fn format_currency(amount: i64, currency: Currency) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    if negative {
        format!("-{grouped} {currency}")
    } else {
        format!("{grouped} {currency}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn fee_formula_applies_percentage_under_cap() {
        let config = AppConfig::default();
        // 50,000 * 1.5% = 750, below the 5,000 cap
        let fees = calculate_payment_fees(50_000, &config.mtn.fees, &config.taxation);
        assert_eq!(fees.fees, 750);
        assert_eq!(fees.taxes, (750.0_f64 * 0.1925).round() as i64);
        assert_eq!(fees.net_amount, 50_000 + fees.fees + fees.taxes);
    }

    #[test]
    fn fee_formula_caps_percentage() {
        let config = AppConfig::default();
        // 1,000,000 * 1.5% = 15,000, capped at 5,000
        let fees = calculate_payment_fees(1_000_000, &config.mtn.fees, &config.taxation);
        assert_eq!(fees.fees, 5_000);
    }

    #[test]
    fn cash_fees_are_fixed() {
        let config = AppConfig::default();
        let fees = calculate_payment_fees(10_000, &config.cash.fees, &config.taxation);
        assert_eq!(fees.fees, 100);
    }

    #[test]
    fn net_amount_identity_holds() {
        let config = AppConfig::default();
        for amount in [500, 12_345, 999_999] {
            let fees = calculate_payment_fees(amount, &config.orange.fees, &config.taxation);
            assert_eq!(fees.net_amount, amount + fees.fees + fees.taxes);
        }
    }

    #[test]
    fn commission_is_rate_of_amount() {
        let config = AppConfig::default();
        assert_eq!(calculate_merchant_commission(100_000, &config.taxation), 2_500);
    }

    #[test]
    fn formats_grouped_integer_with_suffix() {
        assert_eq!(format_currency(50_000, Currency::XAF), "50 000 XAF");
        assert_eq!(format_currency(999, Currency::XAF), "999 XAF");
        assert_eq!(format_currency(5_000_000, Currency::XAF), "5 000 000 XAF");
    }
}
