//! Log-domain arithmetic with a configurable base.
//!
//! Scores throughout the search are kept as logarithms so that products
//! of many small probabilities stay representable. `LOG_ZERO` stands in
//! for the logarithm of zero and absorbs every product it takes part in.

/// Logarithm of zero. Finite so that sums of scores never produce NaN.
pub const LOG_ZERO: f64 = -(f32::MAX as f64);

/// Logarithm of one.
pub const LOG_ONE: f64 = 0.0;

pub const DEFAULT_LOG_BASE: f64 = 1.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogMath {
    base: f64,
    ln_base: f64,
}

impl Default for LogMath {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_BASE)
    }
}

impl LogMath {
    /// Panics unless `base > 1`.
    pub fn new(base: f64) -> Self {
        assert!(base > 1.0, "log base must be greater than 1, got {base}");
        Self {
            base,
            ln_base: base.ln(),
        }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn log_zero(&self) -> f64 {
        LOG_ZERO
    }

    pub fn log_one(&self) -> f64 {
        LOG_ONE
    }

    /// Log-domain product.
    pub fn multiply(&self, a: f64, b: f64) -> f64 {
        if a <= LOG_ZERO || b <= LOG_ZERO {
            return LOG_ZERO;
        }
        (a + b).max(LOG_ZERO)
    }

    /// Log-domain quotient.
    pub fn divide(&self, a: f64, b: f64) -> f64 {
        if a <= LOG_ZERO {
            return LOG_ZERO;
        }
        (a - b).max(LOG_ZERO)
    }

    /// Log-domain sum: `log(b^a + b^b)`, computed as
    /// `max + log(1 + b^(min - max))` so neither operand is exponentiated.
    pub fn add(&self, a: f64, b: f64) -> f64 {
        let (high, low) = if a > b { (a, b) } else { (b, a) };
        if low <= LOG_ZERO {
            return high;
        }
        let diff = (low - high) * self.ln_base;
        high + diff.exp().ln_1p() / self.ln_base
    }

    /// Log-domain difference `log(b^a - b^b)`.
    ///
    /// Panics when `a < b`: the linear difference would be negative.
    pub fn subtract(&self, a: f64, b: f64) -> f64 {
        assert!(
            a >= b,
            "log subtraction would take the log of a negative number ({a} < {b})"
        );
        if b <= LOG_ZERO {
            return a;
        }
        if a == b {
            return LOG_ZERO;
        }
        let diff = (b - a) * self.ln_base;
        let rest = -(diff.exp_m1());
        (a + rest.ln() / self.ln_base).max(LOG_ZERO)
    }

    /// Panics on a negative input. `linear_to_log(0.0)` is `LOG_ZERO`.
    pub fn linear_to_log(&self, linear: f64) -> f64 {
        assert!(
            linear >= 0.0,
            "cannot take the log of a negative value ({linear})"
        );
        if linear == 0.0 {
            return LOG_ZERO;
        }
        (linear.ln() / self.ln_base).max(LOG_ZERO)
    }

    pub fn log_to_linear(&self, log_value: f64) -> f64 {
        if log_value <= LOG_ZERO {
            return 0.0;
        }
        (log_value * self.ln_base).exp()
    }

    /// Converts a natural logarithm into this base.
    pub fn ln_to_log(&self, ln_value: f64) -> f64 {
        if ln_value <= LOG_ZERO {
            return LOG_ZERO;
        }
        (ln_value / self.ln_base).max(LOG_ZERO)
    }

    /// Converts a base-10 logarithm (ARPA-style) into this base.
    pub fn log10_to_log(&self, log10_value: f64) -> f64 {
        if log10_value <= LOG_ZERO {
            return LOG_ZERO;
        }
        self.ln_to_log(log10_value * std::f64::consts::LN_10)
    }

    /// Converts a value in this base into a natural logarithm.
    pub fn log_to_ln(&self, log_value: f64) -> f64 {
        if log_value <= LOG_ZERO {
            return LOG_ZERO;
        }
        log_value * self.ln_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * a.abs().max(b.abs()).max(1e-12)
    }

    #[test]
    fn zero_maps_to_log_zero() {
        let lm = LogMath::default();
        assert_eq!(lm.linear_to_log(0.0), lm.log_zero());
        assert_eq!(lm.log_to_linear(LOG_ZERO), 0.0);
        assert_eq!(lm.linear_to_log(1.0), LOG_ONE);
    }

    #[test]
    #[should_panic(expected = "negative")]
    fn linear_to_log_rejects_negative() {
        LogMath::default().linear_to_log(-0.5);
    }

    #[test]
    #[should_panic(expected = "negative")]
    fn subtract_rejects_smaller_minuend() {
        let lm = LogMath::default();
        lm.subtract(lm.linear_to_log(0.2), lm.linear_to_log(0.3));
    }

    #[test]
    fn add_matches_linear_sum() {
        let lm = LogMath::default();
        let sum = lm.add(lm.linear_to_log(0.25), lm.linear_to_log(0.5));
        assert!(close(lm.log_to_linear(sum), 0.75, 1e-9));
    }

    #[test]
    fn subtract_matches_linear_difference() {
        let lm = LogMath::new(10.0);
        let diff = lm.subtract(lm.linear_to_log(0.75), lm.linear_to_log(0.5));
        assert!(close(lm.log_to_linear(diff), 0.25, 1e-9));
        assert_eq!(lm.subtract(1.0, 1.0), LOG_ZERO);
    }

    #[test]
    fn add_is_stable_at_extremes() {
        let lm = LogMath::default();
        let big = -1.0e30;
        assert_eq!(lm.add(big, 0.0), 0.0);
        assert!(lm.add(-1.0e7, -1.0e7).is_finite());
    }

    #[test]
    fn multiply_absorbs_log_zero() {
        let lm = LogMath::default();
        assert_eq!(lm.multiply(LOG_ZERO, 5.0), LOG_ZERO);
        assert_eq!(lm.multiply(-3.0, -4.0), -7.0);
    }

    #[test]
    fn base_conversions() {
        let lm = LogMath::new(10.0);
        assert!(close(lm.ln_to_log(std::f64::consts::LN_10), 1.0, 1e-12));
        assert!(close(lm.log10_to_log(-2.0), -2.0, 1e-12));
        assert!(close(lm.log_to_ln(1.0), std::f64::consts::LN_10, 1e-12));
    }

    proptest! {
        #[test]
        fn round_trip_recovers_linear(x in 0.0f64..1.0e6) {
            let lm = LogMath::default();
            let back = lm.log_to_linear(lm.linear_to_log(x));
            prop_assert!(close(back, x, 1e-9), "{} -> {}", x, back);
        }

        #[test]
        fn adding_log_zero_is_identity(x in -1.0e9f64..1.0e3) {
            let lm = LogMath::default();
            prop_assert_eq!(lm.add(lm.log_zero(), x), x);
            prop_assert_eq!(lm.add(x, lm.log_zero()), x);
        }

        #[test]
        fn add_is_commutative(a in -1.0e5f64..0.0, b in -1.0e5f64..0.0) {
            let lm = LogMath::default();
            prop_assert_eq!(lm.add(a, b), lm.add(b, a));
        }
    }
}
