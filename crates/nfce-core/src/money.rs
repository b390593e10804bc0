//! Fixed-point Brazilian Real.
//!
//! [`Brl`] stores whole cents in an `i64`. Formatting and parsing follow the
//! Brazilian convention used on receipts: `R$ 1.234,56`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// A currency amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Brl(i64);

impl Brl {
    /// Zero reais.
    pub const ZERO: Self = Self(0);

    /// Build from a cent count.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Build from a value in reais, rounded to the nearest cent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_reais(reais: f64) -> Self {
        Self((reais * 100.0).round() as i64)
    }

    /// Cent count.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Value in reais.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_reais(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// True when the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Multiply by a factor, rounding to the nearest cent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn mul_f64(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    /// Divide by a divisor, rounding to the nearest cent.
    ///
    /// Returns `None` for a zero divisor.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn div_f64(self, divisor: f64) -> Option<Self> {
        if divisor == 0.0 {
            return None;
        }
        Some(Self((self.0 as f64 / divisor).round() as i64))
    }

    /// Ratio of this amount to another. `None` when `other` is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self, other: Self) -> Option<f64> {
        if other.0 == 0 {
            return None;
        }
        Some(self.0 as f64 / other.0 as f64)
    }

    /// Parse Brazilian notation (`R$ 1.234,56`, `1234,5`, `-R$ 3,00`).
    ///
    /// Dots are only accepted as thousands separators in groups of three,
    /// and at most one comma may appear. Fractions longer than two digits
    /// are rounded half-up to the cent.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let fail = |reason: &str| CoreError::InvalidMoney {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut s = input.replace('\u{a0}', " ");
        s = s.trim().to_string();

        let mut negative = false;
        if let Some(rest) = s.strip_prefix('-') {
            negative = true;
            s = rest.trim_start().to_string();
        }
        if let Some(rest) = s.strip_prefix("R$") {
            s = rest.trim_start().to_string();
        }
        if let Some(rest) = s.strip_prefix('-') {
            if negative {
                return Err(fail("duplicate sign"));
            }
            negative = true;
            s = rest.trim_start().to_string();
        }

        if s.is_empty() {
            return Err(fail("empty value"));
        }

        let (int_part, frac_part) = match s.split_once(',') {
            Some((int_part, frac_part)) => {
                if frac_part.contains(',') {
                    return Err(fail("more than one decimal separator"));
                }
                if frac_part.is_empty() || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(fail("fraction must be digits"));
                }
                (int_part, frac_part)
            }
            None => (s.as_str(), ""),
        };

        let reais = parse_integer_part(int_part).ok_or_else(|| fail("malformed integer part"))?;

        let digits = frac_part.as_bytes();
        let digit = |i: usize| digits.get(i).map_or(0, |b| i64::from(b - b'0'));
        let mut cents = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            cents += 1;
        }

        let total = reais
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| fail("value out of range"))?;

        Ok(Self(if negative { -total } else { total }))
    }
}

/// Accepts plain digits (`1234`) or dot-grouped thousands (`1.234.567`).
fn parse_integer_part(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }

    let groups: Vec<&str> = s.split('.').collect();
    let well_formed = groups.iter().enumerate().all(|(i, group)| {
        let len_ok = if i == 0 {
            !group.is_empty() && (groups.len() == 1 || group.len() <= 3)
        } else {
            group.len() == 3
        };
        len_ok && group.bytes().all(|b| b.is_ascii_digit())
    });
    if !well_formed {
        return None;
    }

    groups.concat().parse().ok()
}

impl FromStr for Brl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Brl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0.unsigned_abs();
        let reais = (value / 100).to_string();
        let cents = value % 100;

        let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
        for (i, ch) in reais.chars().enumerate() {
            if i > 0 && (reais.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "R$ {sign}{grouped},{cents:02}")
    }
}

impl Add for Brl {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Brl {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Brl {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Brl {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Brl {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Brl> for Brl {
    fn sum<I: Iterator<Item = &'a Brl>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
