//! Exchange precision helpers.
//!
//! Every price, volume and cost is truncated toward zero to the venue's
//! decimal precision. Values are never rounded up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Truncate toward zero to `decimals` places
#[inline]
pub fn truncate(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
    use rust_decimal_macros::dec;

    #[test]
    fn test_truncate_never_rounds_up() {
        assert_eq!(truncate(dec!(1.239), 2), dec!(1.23));
        assert_eq!(truncate(dec!(0.99999999), 4), dec!(0.9999));
        assert_eq!(truncate(dec!(220.0), 2), dec!(220));
        assert_eq!(truncate(dec!(5), 0), dec!(5));
    }

    #[test]
    fn test_truncate_matches_floor_formula() {
        for (raw, decimals) in [(1.23456, 3u32), (98765.4321, 1), (0.000912, 5), (42.0, 8)] {
            let scale = 10f64.powi(decimals as i32);
            let expected = (raw * scale).floor() / scale;
            let got = truncate(Decimal::from_f64(raw).unwrap(), decimals);
            assert_eq!(got.to_f64().unwrap(), expected, "raw={raw} decimals={decimals}");
        }
    }
}
