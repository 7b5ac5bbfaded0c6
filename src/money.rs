// 💵 Money - Fixed-precision currency in integer cents
//
// Fiscal sums run over thousands of line items; binary floating point
// drifts. Every amount in the engine is an i64 count of cents.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use thiserror::Error;

/// Amount in integer cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Money(dollars.saturating_mul(100))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn abs(self) -> Money {
        Money(self.0.saturating_abs())
    }

    /// `None` when the sum leaves the `i64` cents range
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

// Operators saturate at the ends of the cents range

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    /// `$1,234,567.89`, negatives as `-$5.00`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{}${}.{:02}", sign, grouped, cents)
    }
}

// ============================================================================
// PARSING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparsable amount {0:?}")]
pub struct MoneyParseError(pub String);

static MONEY_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(?\$\s?\d[\d,]*(?:\.\d+)?(?:\s+(?:million|billion))?\)?")
        .unwrap_or_else(|e| panic!("invalid money literal pattern: {e}"))
});

/// Parse a currency literal such as `$1,200,000`, `($500)` or
/// `$2.5 million` into cents.
///
/// Fails on empty input, stray characters and fractional cents. Never
/// returns zero for something it could not read.
pub fn parse_money(literal: &str) -> Result<Money, MoneyParseError> {
    let err = || MoneyParseError(literal.to_string());

    let mut s = literal.trim().trim_end_matches(&['.', ';', ','][..]).trim();

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s.trim_start_matches('(').trim_end_matches(')').trim();
    }
    let (s, negative) = match s.strip_prefix('-') {
        Some(rest) => (rest, !negative),
        None => (s, negative),
    };

    let lower = s.to_ascii_lowercase();
    let (body, scale): (&str, i128) = if let Some(rest) = lower.strip_suffix("billion") {
        (rest, 1_000_000_000)
    } else if let Some(rest) = lower.strip_suffix("million") {
        (rest, 1_000_000)
    } else {
        (lower.as_str(), 1)
    };

    let cleaned: String = body
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(err());
    }

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(err());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }

    // Exact decimal arithmetic: digits * scale * 100 / 10^frac_len
    let digits = format!("{}{}", int_part, frac_part);
    let mantissa: i128 = digits.parse().map_err(|_| err())?;
    let denominator = 10i128.checked_pow(frac_part.len() as u32).ok_or_else(err)?;
    let numerator = mantissa
        .checked_mul(scale)
        .and_then(|v| v.checked_mul(100))
        .ok_or_else(err)?;
    if numerator % denominator != 0 {
        return Err(err());
    }

    let cents = i64::try_from(numerator / denominator).map_err(|_| err())?;
    Ok(Money(if negative { -cents } else { cents }))
}

/// Every currency literal in free text, in order of appearance
pub fn find_money_literals(text: &str) -> Vec<&str> {
    MONEY_LITERAL
        .find_iter(text)
        .map(|m| {
            let lit = m.as_str().trim_end_matches(',');
            // A lone closing paren belongs to the sentence, not the amount
            if lit.ends_with(')') && !lit.starts_with('(') {
                lit.trim_end_matches(')')
            } else {
                lit.trim_start_matches('(').trim_end_matches(')')
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_grouped() {
        assert_eq!(parse_money("$1,000,000").unwrap(), Money::from_dollars(1_000_000));
        assert_eq!(parse_money("$500,000").unwrap(), Money::from_dollars(500_000));
        assert_eq!(parse_money(" 42 ").unwrap(), Money::from_dollars(42));
        assert_eq!(parse_money("$12.50").unwrap(), Money::from_cents(1250));
        assert_eq!(parse_money("$1,234,567.").unwrap(), Money::from_dollars(1_234_567));
    }

    #[test]
    fn test_parse_negative_and_suffix() {
        assert_eq!(parse_money("($500)").unwrap(), Money::from_dollars(-500));
        assert_eq!(parse_money("-$75").unwrap(), Money::from_dollars(-75));
        assert_eq!(parse_money("$2.5 million").unwrap(), Money::from_dollars(2_500_000));
        assert_eq!(parse_money("$1 Billion").unwrap(), Money::from_dollars(1_000_000_000));
    }

    #[test]
    fn test_parse_rejects_garbage_instead_of_zero() {
        assert!(parse_money("").is_err());
        assert!(parse_money("$").is_err());
        assert!(parse_money("$12,3x4").is_err());
        assert!(parse_money("n/a").is_err());
        assert!(parse_money("$1.005").is_err());
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_dollars(1_200_000);
        let b = Money::from_dollars(1_000_000);
        assert_eq!(a - b, Money::from_dollars(200_000));
        assert_eq!(-(a - b), Money::from_dollars(-200_000));

        let total: Money = vec![a, b].into_iter().sum();
        assert_eq!(total, Money::from_dollars(2_200_000));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(123_456_789).to_string(), "$1,234,567.89");
        assert_eq!(Money::from_dollars(-5).to_string(), "-$5.00");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
        assert_eq!(Money::from_dollars(100).to_string(), "$100.00");
    }

    #[test]
    fn test_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_dollars(3)).unwrap();
        assert_eq!(json, "300");
    }

    #[test]
    fn test_find_money_literals() {
        let text = "$250,000 of the general fund is provided solely for a pilot, and $1.5 million for grants.";
        assert_eq!(find_money_literals(text), vec!["$250,000", "$1.5 million"]);
        assert!(find_money_literals("no amounts here").is_empty());
    }
}
