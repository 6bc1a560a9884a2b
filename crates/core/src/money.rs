//! Fixed-point currency amounts.
//!
//! All amounts are stored as signed integers in the smallest currency unit
//! (pesewas / cents). Conversion to a decimal is for presentation only.

use core::fmt;
use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Number of minor units in one major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

/// Largest amount, in minor units, accepted from input. Leaves headroom for
/// summing a customer's whole history in an `i64`.
pub const MAX_INPUT_MINOR: i64 = 1_000_000_000_000_000;

/// Currency prefix accepted (and ignored) when parsing form input.
const CURRENCY_PREFIX: char = '₵';

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal string such as `"120"`, `"120.5"`, `"₵ 1,200.00"` or `"-3.10"`.
    ///
    /// At most two fractional digits are accepted; thousands separators are ignored.
    pub fn parse_decimal(raw: &str) -> Result<Self, DomainError> {
        let cleaned: String = raw
            .trim()
            .trim_start_matches(CURRENCY_PREFIX)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if cleaned.is_empty() {
            return Err(DomainError::validation("amount is required"));
        }

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let invalid = || DomainError::validation(format!("invalid amount: {raw}"));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 {
            return Err(DomainError::validation(format!(
                "amount has more than two decimal places: {raw}"
            )));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let minor = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(invalid)?;
        if minor > MAX_INPUT_MINOR {
            return Err(DomainError::validation(format!("amount is too large: {raw}")));
        }
        Ok(Self(if negative { -minor } else { minor }))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Sum of `amounts`, or `None` if the total does not fit.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Decimal value for display or JSON presentation.
    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// `self * qty`, failing on overflow.
    pub fn times(self, qty: u32) -> Result<Self, DomainError> {
        self.0
            .checked_mul(i64::from(qty))
            .map(Self)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Divide into `parts` equal shares, rounded half away from zero to the
    /// nearest minor unit. Returns `None` when `parts` is zero.
    pub fn div_round(self, parts: u32) -> Option<Self> {
        if parts == 0 {
            return None;
        }
        let n = i64::from(parts);
        let q = self.0 / n;
        let r = self.0 % n;
        let adjust = if r.abs() * 2 >= n { self.0.signum() } else { 0 };
        Some(Self(q + adjust))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}
