//! Cent-exact money and profit-share ratio types backed by rust_decimal.
//!
//! Every `Money` value is held at exactly two fractional digits. Arithmetic
//! rounds half-up back to cents after each step, so sums of stored amounts
//! never drift. Ratios keep eight fractional digits.

use rust_decimal::RoundingStrategy;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CENTS_DP: u32 = 2;
const RATIO_DP: u32 = 8;
/// Largest single amount the ledger accepts, in dollars.
const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

/// Errors raised by money arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// A currency amount with cent precision.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Money {
    pub const ZERO: Money = Money(RustDecimal::ZERO);

    /// Upper bound for any single amount. Products of two bounded amounts
    /// stay well inside the decimal range.
    pub fn max_amount() -> Money {
        Money::from_cents(MAX_AMOUNT_UNITS * 100)
    }

    /// Round an arbitrary decimal half-up to cents.
    pub fn round(value: RustDecimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(CENTS_DP, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(CENTS_DP);
        Money(rounded)
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(RustDecimal::new(cents, CENTS_DP))
    }

    /// Parse any decimal string, rounding to cents.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        RustDecimal::from_str(s.trim())
            .map(Money::round)
            .map_err(|e| MoneyError::InvalidAmount(format!("{}: {}", s, e)))
    }

    /// Parse a user-supplied amount: strictly positive, at most two fractional digits.
    pub fn parse_amount(s: &str) -> Result<Self, MoneyError> {
        let raw = RustDecimal::from_str(s.trim())
            .map_err(|e| MoneyError::InvalidAmount(format!("{}: {}", s, e)))?;
        Self::validate_amount(raw)
    }

    /// Validate an already-parsed amount with the same rules as [`Money::parse_amount`].
    pub fn validate_amount(raw: RustDecimal) -> Result<Self, MoneyError> {
        if raw.normalize().scale() > CENTS_DP {
            return Err(MoneyError::InvalidAmount(format!(
                "{} has more than two decimal places",
                raw
            )));
        }
        if raw <= RustDecimal::ZERO {
            return Err(MoneyError::InvalidAmount(format!("{} must be positive", raw)));
        }
        let amount = Money::round(raw);
        if amount > Money::max_amount() {
            return Err(MoneyError::InvalidAmount(format!(
                "{} exceeds the maximum of {}",
                raw,
                Money::max_amount()
            )));
        }
        Ok(amount)
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn add(self, rhs: Money) -> Money {
        Money::round(self.0 + rhs.0)
    }

    pub fn subtract(self, rhs: Money) -> Money {
        Money::round(self.0 - rhs.0)
    }

    /// Scale by a dimensionless factor (fee multiplier, ratio, ...).
    pub fn multiply(self, factor: RustDecimal) -> Money {
        Money::round(self.0 * factor)
    }

    pub fn divide(self, divisor: RustDecimal) -> Result<Money, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::InvalidOperation("division by zero".to_string()));
        }
        Ok(Money::round(self.0 / divisor))
    }

    /// `percent` is expressed in whole percent, e.g. `15` for 15%.
    pub fn percentage(self, percent: RustDecimal) -> Money {
        Money::round(self.0 * percent / RustDecimal::ONE_HUNDRED)
    }

    /// Share of `self` in `total` as a ratio.
    pub fn ratio_of(self, total: Money) -> Result<Ratio, MoneyError> {
        if total.is_zero() {
            return Err(MoneyError::InvalidOperation("division by zero".to_string()));
        }
        Ok(Ratio::new(self.0 / total.0))
    }

    /// Truncate an arbitrary decimal toward zero at cents.
    pub fn truncate(value: RustDecimal) -> Self {
        let mut truncated = value.round_dp_with_strategy(CENTS_DP, RoundingStrategy::ToZero);
        truncated.rescale(CENTS_DP);
        Money(truncated)
    }

    /// Multiply by a ratio and truncate toward zero, never rounding a share up.
    pub fn floor_share(self, ratio: Ratio) -> Money {
        Money::truncate(self.0 * ratio.inner())
    }

    /// Compare with a one-cent tolerance to absorb repeated rounding.
    pub fn compare(&self, other: &Money) -> Ordering {
        let diff = (self.0 - other.0).abs();
        if diff <= RustDecimal::new(1, CENTS_DP) {
            Ordering::Equal
        } else {
            self.0.cmp(&other.0)
        }
    }

    pub fn approx_eq(&self, other: &Money) -> bool {
        self.compare(other) == Ordering::Equal
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > RustDecimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < RustDecimal::ZERO
    }

    pub fn min(self, other: Money) -> Money {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Money) -> Money {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Always two fractional digits, no exponent.
    pub fn to_canonical_string(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::add(self, rhs)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::subtract(self, rhs)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// Dimensionless share in [0, 1], kept at eight fractional digits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ratio(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Ratio {
    pub const ZERO: Ratio = Ratio(RustDecimal::ZERO);
    pub const ONE: Ratio = Ratio(RustDecimal::ONE);

    pub fn new(value: RustDecimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(RATIO_DP, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(RATIO_DP);
        Ratio(rounded)
    }

    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        RustDecimal::from_str(s.trim())
            .map(Ratio::new)
            .map_err(|e| MoneyError::InvalidAmount(format!("{}: {}", s, e)))
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_canonical_string(&self) -> String {
        format!("{:.8}", self.0)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Ratio {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ratio::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_results_are_rounded_to_cents() {
        assert_eq!(m("0.1") + m("0.2"), m("0.30"));
        assert_eq!(m("10.005").to_canonical_string(), "10.01");
        assert_eq!(m("10").multiply(RustDecimal::new(115, 2)), m("11.50"));
        assert_eq!(m("115").to_canonical_string(), "115.00");
    }

    #[test]
    fn test_amounts_are_bounded() {
        assert_eq!(
            Money::parse_amount("1000000000000").unwrap(),
            Money::max_amount()
        );
        let err = Money::parse_amount("1000000000000.01").unwrap_err();
        assert!(matches!(err, MoneyError::InvalidAmount(_)));
        assert!(Money::parse_amount("1e15").is_err());
    }

    #[test]
    fn test_divide_by_zero_is_invalid_operation() {
        let err = m("10").divide(RustDecimal::ZERO).unwrap_err();
        assert!(matches!(err, MoneyError::InvalidOperation(_)));
        assert!(m("1").ratio_of(Money::ZERO).is_err());
    }

    #[test]
    fn test_divide_rounds_half_up() {
        assert_eq!(m("10").divide(RustDecimal::from(3)).unwrap(), m("3.33"));
        assert_eq!(m("0.05").divide(RustDecimal::from(2)).unwrap(), m("0.03"));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(m("100").percentage(RustDecimal::from(15)), m("15"));
        assert_eq!(m("1").percentage(RustDecimal::from(15)), m("0.15"));
    }

    #[test]
    fn test_compare_tolerates_one_cent() {
        assert_eq!(m("1.00").compare(&m("1.01")), Ordering::Equal);
        assert_eq!(m("1.00").compare(&m("1.02")), Ordering::Less);
        assert_eq!(m("2.00").compare(&m("1.00")), Ordering::Greater);
        assert!(m("0.99").approx_eq(&m("1.00")));
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert!(Money::parse_amount("0").is_err());
        assert!(Money::parse_amount("-5").is_err());
        assert!(Money::parse_amount("1.001").is_err());
        assert!(Money::parse_amount("abc").is_err());
        assert_eq!(Money::parse_amount("1.50").unwrap(), m("1.5"));
        assert_eq!(Money::parse_amount("2.100").unwrap(), m("2.10"));
    }

    #[test]
    fn test_floor_share_never_rounds_up() {
        let third = Ratio::new(RustDecimal::ONE / RustDecimal::from(3));
        assert_eq!(m("1.00").floor_share(third), m("0.33"));
        assert_eq!(m("0.85").floor_share(Ratio::new(RustDecimal::new(5, 1))), m("0.42"));
    }

    #[test]
    fn test_ratio_of() {
        let r = m("42.50").ratio_of(m("85.00")).unwrap();
        assert_eq!(r.to_canonical_string(), "0.50000000");
    }

    #[test]
    fn test_json_is_string() {
        let json = serde_json::to_value(m("12.3")).unwrap();
        assert_eq!(json, serde_json::json!("12.30"));
    }

    #[test]
    fn test_min_max_and_sum() {
        assert_eq!(m("1").min(m("2")), m("1"));
        assert_eq!(m("1").max(m("2")), m("2"));
        let total: Money = vec![m("1.10"), m("2.20"), m("3.30")].into_iter().sum();
        assert_eq!(total, m("6.60"));
    }
}
