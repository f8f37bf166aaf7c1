//! Input data corrections applied at the boundary, kept apart from the
//! simulation math so the policy can change on its own.

use tracing::warn;

pub const TAX_RATE_CAP_PERCENT: f64 = 80.0;

/// Corrects an implausible capital-gains tax rate given in percent.
///
/// Values above 100 are read as a misplaced decimal point (2625 means
/// 26.25) and divided by 100 once. The cap then applies to every value,
/// including plausible inputs between 80 and 100 (95 becomes 80), which is
/// wider than capping only corrected values. Non-finite or negative input
/// becomes 0. Never fails.
pub fn normalize_tax_rate_percent(raw: f64) -> f64 {
    let corrected = if !raw.is_finite() || raw < 0.0 {
        0.0
    } else if raw > 100.0 {
        (raw / 100.0).min(TAX_RATE_CAP_PERCENT)
    } else {
        raw.min(TAX_RATE_CAP_PERCENT)
    };

    if corrected != raw {
        warn!(raw, corrected, "capital gains tax rate corrected");
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert, proptest};

    #[test]
    fn misplaced_decimal_is_divided_once() {
        assert_eq!(normalize_tax_rate_percent(2625.0), 26.25);
    }

    #[test]
    fn rates_between_cap_and_hundred_are_clamped() {
        assert_eq!(normalize_tax_rate_percent(80.5), 80.0);
        assert_eq!(normalize_tax_rate_percent(100.0), 80.0);
    }

    #[test]
    fn still_implausible_rate_is_clamped_to_cap() {
        assert_eq!(normalize_tax_rate_percent(9999.0), 80.0);
        assert_eq!(normalize_tax_rate_percent(95.0), 80.0);
    }

    #[test]
    fn plausible_rates_pass_through() {
        assert_eq!(normalize_tax_rate_percent(26.25), 26.25);
        assert_eq!(normalize_tax_rate_percent(0.0), 0.0);
        assert_eq!(normalize_tax_rate_percent(80.0), 80.0);
        assert_eq!(normalize_tax_rate_percent(100.0), 80.0);
    }

    #[test]
    fn garbage_becomes_zero() {
        assert_eq!(normalize_tax_rate_percent(-5.0), 0.0);
        assert_eq!(normalize_tax_rate_percent(f64::NAN), 0.0);
        assert_eq!(normalize_tax_rate_percent(f64::INFINITY), 0.0);
    }

    proptest! {
        #[test]
        fn result_always_within_cap(raw in any::<f64>()) {
            let rate = normalize_tax_rate_percent(raw);
            prop_assert!((0.0..=TAX_RATE_CAP_PERCENT).contains(&rate));
        }
    }
}
