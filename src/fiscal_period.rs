// 📅 Fiscal-Period Inferencer - Account label to fiscal year and biennium
//
// Bienniums are named by their odd start year. Labels carry either a
// fiscal year tag (`FY 2024`) or, on summary rows, an explicit span.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static FISCAL_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:FY|fiscal\s+year)\s*(\d{4})\b")
        .unwrap_or_else(|e| panic!("invalid fiscal year pattern: {e}"))
});

static BIENNIUM_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})\s*-\s*(\d{4})\b")
        .unwrap_or_else(|e| panic!("invalid biennium pattern: {e}"))
});

static BIENNIUM_SHORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})\b")
        .unwrap_or_else(|e| panic!("invalid short biennium pattern: {e}"))
});

// ============================================================================
// BIENNIUM
// ============================================================================

/// Two-year budget period, named by its start and end years (`2023-2025`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Biennium {
    pub start: i32,
    pub end: i32,
}

impl Biennium {
    pub fn new(start: i32, end: i32) -> Self {
        Biennium { start, end }
    }

    /// Biennium under the odd-year-start convention
    pub fn for_fiscal_year(fiscal_year: i32) -> Self {
        let start = if fiscal_year % 2 == 0 { fiscal_year - 1 } else { fiscal_year };
        Biennium { start, end: start + 2 }
    }

    /// First `YYYY-YYYY` span in text, or a `YYYY-YY` short form
    /// (`2025-27` becomes `2025-2027`)
    pub fn parse_loose(text: &str) -> Option<Self> {
        if let Some(caps) = BIENNIUM_SPAN.captures(text) {
            let start = caps[1].parse().ok()?;
            let end = caps[2].parse().ok()?;
            return Some(Biennium { start, end });
        }
        let caps = BIENNIUM_SHORT.captures(text)?;
        let start: i32 = caps[1].parse().ok()?;
        let short: i32 = caps[2].parse().ok()?;
        let mut end = (start / 100) * 100 + short;
        if end < start {
            end += 100;
        }
        Some(Biennium { start, end })
    }
}

impl fmt::Display for Biennium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl TryFrom<String> for Biennium {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| format!("invalid biennium {:?}", value))?;
        let start = start.trim().parse().map_err(|_| format!("invalid biennium {:?}", value))?;
        let end = end.trim().parse().map_err(|_| format!("invalid biennium {:?}", value))?;
        Ok(Biennium { start, end })
    }
}

impl From<Biennium> for String {
    fn from(b: Biennium) -> String {
        b.to_string()
    }
}

// ============================================================================
// INFERENCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalPeriod {
    pub fiscal_year: Option<i32>,
    pub biennium: Option<Biennium>,
}

impl FiscalPeriod {
    pub fn is_unknown(&self) -> bool {
        self.fiscal_year.is_none() && self.biennium.is_none()
    }
}

/// Infer the fiscal year and biennium of an account label.
///
/// A verbatim `YYYY-YYYY` span in the label wins. Otherwise the biennium
/// comes from the fiscal year under the odd-year-start rule. The label is
/// the only input: the bill's own biennium never overrides a tagged year.
/// When nothing matches both fields stay `None` and the caller decides how
/// to report it.
pub fn infer_fiscal_period(label: &str) -> FiscalPeriod {
    let fiscal_year = FISCAL_YEAR
        .captures(label)
        .and_then(|caps| caps[1].parse::<i32>().ok());

    let explicit = BIENNIUM_SPAN.captures(label).and_then(|caps| {
        let start = caps[1].parse().ok()?;
        let end = caps[2].parse().ok()?;
        Some(Biennium { start, end })
    });

    let biennium = explicit.or_else(|| fiscal_year.map(Biennium::for_fiscal_year));

    FiscalPeriod { fiscal_year, biennium }
}
