//! # Decimal: Arbitrary-Exponent Decimal Numbers
//!
//! An Ion decimal is `coefficient × 10^exponent`. The exponent is part of the
//! value's identity: `1.0` (coefficient 10, exponent -1) and `1.00`
//! (coefficient 100, exponent -2) are numerically equal but not equivalent.
//! Derived `PartialEq` therefore compares the pair, and numeric ordering is a
//! separate operation ([`Decimal::numeric_cmp`]).

use std::cmp::Ordering;
use std::fmt;

/// A decimal number with an explicit exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    coefficient: i128,
    exponent: i32,
}

impl Decimal {
    /// Create a decimal from its coefficient and exponent.
    pub fn new(coefficient: i128, exponent: i32) -> Self {
        Self {
            coefficient,
            exponent,
        }
    }

    /// An integral decimal with exponent zero.
    pub fn from_int(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }

    /// The unscaled coefficient.
    pub fn coefficient(&self) -> i128 {
        self.coefficient
    }

    /// The power of ten applied to the coefficient.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Number of significant digits in the coefficient (at least 1).
    pub fn precision(&self) -> u32 {
        let mut digits = 1;
        let mut rest = self.coefficient.unsigned_abs() / 10;
        while rest > 0 {
            digits += 1;
            rest /= 10;
        }
        digits
    }

    /// Lossy conversion used when comparing against floats.
    pub fn to_f64(&self) -> f64 {
        // Parsing the rendered form keeps the rounding identical to the reader.
        format!("{}e{}", self.coefficient, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }

    /// Compare numeric magnitude, ignoring exponent identity.
    pub fn numeric_cmp(&self, other: &Decimal) -> Ordering {
        let sign = self.coefficient.signum().cmp(&other.coefficient.signum());
        if sign != Ordering::Equal || self.coefficient == 0 {
            return sign;
        }
        let magnitude = self.magnitude_cmp(other);
        if self.coefficient < 0 {
            magnitude.reverse()
        } else {
            magnitude
        }
    }

    /// Exponent of the leading digit: `123d4` is `1.23 × 10^6`.
    fn adjusted_exponent(&self) -> i64 {
        i64::from(self.exponent) + i64::from(self.precision()) - 1
    }

    fn magnitude_cmp(&self, other: &Decimal) -> Ordering {
        match self.adjusted_exponent().cmp(&other.adjusted_exponent()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        // Equal leading exponents bound the shift by the coefficient width.
        let target = i64::from(self.exponent.min(other.exponent));
        let scaled = |d: &Decimal| {
            let shift = u32::try_from(i64::from(d.exponent) - target).ok()?;
            rescale(d.coefficient.unsigned_abs(), shift)
        };
        match (scaled(self), scaled(other)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self
                .to_f64()
                .abs()
                .partial_cmp(&other.to_f64().abs())
                .unwrap_or(Ordering::Equal),
        }
    }
}

/// Multiply `magnitude` by `10^shift`, or `None` on overflow.
fn rescale(magnitude: u128, shift: u32) -> Option<u128> {
    10u128.checked_pow(shift)?.checked_mul(magnitude)
}

/// Longest run of leading zeros written out after the decimal point.
const MAX_LEADING_ZEROS: usize = 20;

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.coefficient < 0 { "-" } else { "" };
        let digits = self.coefficient.unsigned_abs().to_string();
        if self.exponent > 0 {
            return write!(f, "{sign}{digits}d{}", self.exponent);
        }
        if self.exponent == 0 {
            return write!(f, "{sign}{digits}.");
        }
        let scale = self.exponent.unsigned_abs() as usize;
        if digits.len() > scale {
            let (whole, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{whole}.{frac}")
        } else if scale - digits.len() <= MAX_LEADING_ZEROS {
            write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        } else {
            write!(f, "{sign}{digits}d{}", self.exponent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_counts_coefficient_digits() {
        assert_eq!(Decimal::new(0, 0).precision(), 1);
        assert_eq!(Decimal::new(12345, -2).precision(), 5);
        assert_eq!(Decimal::new(-700, 3).precision(), 3);
    }

    #[test]
    fn test_exponent_is_part_of_identity() {
        let a = Decimal::new(10, -1);
        let b = Decimal::new(100, -2);
        assert_ne!(a, b);
        assert_eq!(a.numeric_cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_numeric_cmp_orders_by_magnitude() {
        assert_eq!(
            Decimal::new(15, -1).numeric_cmp(&Decimal::new(2, 0)),
            Ordering::Less
        );
        assert_eq!(
            Decimal::new(-3, 0).numeric_cmp(&Decimal::new(1, 5)),
            Ordering::Less
        );
        assert_eq!(
            Decimal::new(1, 2).numeric_cmp(&Decimal::new(99, 0)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_numeric_cmp_with_distant_exponents() {
        let huge = Decimal::new(1, i32::MAX);
        let tiny = Decimal::new(1, i32::MIN);
        assert_eq!(huge.numeric_cmp(&tiny), Ordering::Greater);
        assert_eq!(tiny.numeric_cmp(&huge), Ordering::Less);
        assert_eq!(Decimal::new(-1, i32::MAX).numeric_cmp(&Decimal::new(-1, i32::MIN)), Ordering::Less);
        assert_eq!(Decimal::new(5, 0).numeric_cmp(&Decimal::new(1, -2147483647)), Ordering::Greater);
        assert_eq!(Decimal::new(5, 0).numeric_cmp(&Decimal::new(1, 2147483647)), Ordering::Less);
    }

    #[test]
    fn test_numeric_cmp_same_leading_exponent() {
        assert_eq!(Decimal::new(123, 0).numeric_cmp(&Decimal::new(12, 1)), Ordering::Greater);
        assert_eq!(Decimal::new(-123, 0).numeric_cmp(&Decimal::new(-12, 1)), Ordering::Less);
        assert_eq!(Decimal::new(120, 0).numeric_cmp(&Decimal::new(12, 1)), Ordering::Equal);
        let wide = Decimal::new(i128::MAX, 0);
        assert_eq!(wide.numeric_cmp(&Decimal::new(1, 38)), Ordering::Greater);
    }

    #[test]
    fn test_display_switches_to_exponent_form_for_tiny_values() {
        assert_eq!(Decimal::new(1, -21).to_string(), "0.000000000000000000001");
        assert_eq!(Decimal::new(1, -22).to_string(), "1d-22");
        assert_eq!(Decimal::new(-15, -2000000000).to_string(), "-15d-2000000000");
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Decimal::new(12345, -2).to_string(), "123.45");
        assert_eq!(Decimal::new(5, -3).to_string(), "0.005");
        assert_eq!(Decimal::new(-42, 0).to_string(), "-42.");
        assert_eq!(Decimal::new(7, 2).to_string(), "7d2");
        assert_eq!(Decimal::new(0, -2).to_string(), "0.00");
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(Decimal::new(25, -1).to_f64(), 2.5);
    }
}
