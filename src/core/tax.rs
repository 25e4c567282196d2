//! IGV arithmetic over tax-inclusive amounts.
//!
//! The pipeline works backwards from the amounts actually charged: stored
//! prices include IGV, and the taxable base is derived by dividing the
//! inclusive amount by 1.18. Every derived amount is rounded to two
//! decimals independently. Line-level and document-level derivations can
//! therefore disagree by a cent; the amounts charged stay exact and the
//! drift is accepted on the fiscal side.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Statutory IGV rate (18%).
pub const IGV_RATE: Decimal = dec!(0.18);

/// Divisor that strips IGV from a tax-inclusive amount.
const IGV_DIVISOR: Decimal = dec!(1.18);

/// Round to two decimal places, half away from zero (commercial rounding).
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// IGV-exclusive base of a tax-inclusive amount, rounded to two decimals.
pub fn net_of_igv(inclusive: Decimal) -> Decimal {
    round_half_up(inclusive / IGV_DIVISOR)
}

/// IGV portion of a tax-inclusive amount: the amount minus its
/// independently rounded base, rounded again to two decimals.
pub fn igv_portion(inclusive: Decimal) -> Decimal {
    round_half_up(inclusive - net_of_igv(inclusive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_round_inclusive_amount() {
        assert_eq!(net_of_igv(dec!(118.00)), dec!(100.00));
        assert_eq!(igv_portion(dec!(118.00)), dec!(18.00));
    }

    #[test]
    fn base_plus_tax_reconstructs_two_decimal_amounts() {
        for cents in [1u32, 10, 99, 1180, 9999, 123456] {
            let inclusive = Decimal::new(cents as i64, 2);
            let sum = net_of_igv(inclusive) + igv_portion(inclusive);
            assert_eq!(sum, inclusive, "drift for {inclusive}");
        }
    }

    #[test]
    fn line_and_document_derivations_may_drift() {
        // Three lines of 0.10: per-line IGV rounds to 0.02 each, but the
        // 0.30 total derives 0.05. Both are kept as produced.
        let per_line: Decimal = (0..3).map(|_| igv_portion(dec!(0.10))).sum();
        assert_eq!(per_line, dec!(0.06));
        assert_eq!(igv_portion(dec!(0.30)), dec!(0.05));
    }
}
