use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "USD";
pub const USD_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------        Money        ---------------------------------------------------------
/// A monetary amount with two decimal places of precision, stored as an integer number of cents.
///
/// Amounts are formatted with exactly two decimal digits and no thousands separators. Signed provider payloads
/// depend on this rendering being byte-stable, so all formatting goes through [`Money::format`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid monetary amount: {0}")]
pub struct MoneyError(String);

impl From<String> for MoneyError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (negative, rest) = match raw.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(MoneyError(format!("'{s}' is not a decimal amount")));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyError(format!("'{s}' is not a decimal amount")));
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|e| MoneyError(format!("'{s}' is out of range. {e}")))?
        };
        // Amounts keep two decimal places. A third digit rounds half-up, matching the provider's quantization.
        let frac_cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| MoneyError(e.to_string()))? * 10,
            _ => {
                let cents = frac[..2].parse::<i64>().map_err(|e| MoneyError(e.to_string()))?;
                let round_up = frac.as_bytes()[2] >= b'5';
                cents + i64::from(round_up)
            },
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(|| MoneyError(format!("'{s}' is out of range")))?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Renders the amount with exactly two decimal digits, e.g. `25.00`. The checkout signature is computed over
    /// this exact string form.
    pub fn format(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", cents / 100, cents % 100)
    }

    /// Compares two amounts, allowing for rounding drift up to `tolerance` in either direction.
    pub fn matches(&self, expected: Money, tolerance: Money) -> bool {
        (self.0 - expected.0).abs() <= tolerance.0.abs()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(serde::de::Error::custom)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(serde::de::Error::custom(MoneyError(format!("'{v}' is not a decimal amount"))));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Money((v * 100.0).round() as i64))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Money::from_whole(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v).map(Money::from_whole).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!("25".parse::<Money>().unwrap(), Money::from_cents(2500));
        assert_eq!("25.5".parse::<Money>().unwrap(), Money::from_cents(2550));
        assert_eq!("25.00".parse::<Money>().unwrap(), Money::from_cents(2500));
        assert_eq!(".75".parse::<Money>().unwrap(), Money::from_cents(75));
        assert_eq!("-3.10".parse::<Money>().unwrap(), Money::from_cents(-310));
    }

    #[test]
    fn rounds_excess_precision_half_up() {
        assert_eq!("1.005".parse::<Money>().unwrap(), Money::from_cents(101));
        assert_eq!("1.004".parse::<Money>().unwrap(), Money::from_cents(100));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!(".".parse::<Money>().is_err());
        assert!("12a".parse::<Money>().is_err());
        assert!("1,200".parse::<Money>().is_err());
    }

    #[test]
    fn format_is_byte_stable() {
        assert_eq!(Money::from_cents(2500).format(), "25.00");
        assert_eq!(Money::from_cents(5).format(), "0.05");
        assert_eq!(Money::from_cents(-5).format(), "-0.05");
        assert_eq!(Money::from_cents(123456).format(), "1234.56");
    }

    #[test]
    fn tolerance_window_is_inclusive() {
        let expected = Money::from_cents(2500);
        let tolerance = Money::from_cents(1);
        assert!(Money::from_cents(2501).matches(expected, tolerance));
        assert!(Money::from_cents(2499).matches(expected, tolerance));
        assert!(!Money::from_cents(2502).matches(expected, tolerance));
        assert!(!Money::from_cents(2498).matches(expected, tolerance));
    }

    #[test]
    fn arithmetic_and_sum() {
        let total: Money = vec![Money::from_cents(1000) * 2, Money::from_cents(500)].into_iter().sum();
        assert_eq!(total, Money::from_cents(2500));
        assert_eq!(Money::from_cents(2500) - Money::from_cents(500), Money::from_cents(2000));
    }
}
