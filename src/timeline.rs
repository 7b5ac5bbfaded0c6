// 📈 Appropriations Timeline - Cross-bill funding history
//
// Reduces many bills' fiscal aggregates into agency x biennium totals and
// classifies each consecutive-biennium transition. Runs after extraction,
// single-threaded, over already-computed aggregates.

use crate::aggregate::FiscalAggregate;
use crate::fiscal_period::Biennium;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Growth/cut threshold in basis points (5%)
pub const CHANGE_THRESHOLD_BPS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Growth,
    Cut,
    Stable,
    New,
    Discontinued,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Growth => "growth",
            ChangeKind::Cut => "cut",
            ChangeKind::Stable => "stable",
            ChangeKind::New => "new",
            ChangeKind::Discontinued => "discontinued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingChange {
    pub agency_code: String,
    pub from_biennium: Biennium,
    pub to_biennium: Biennium,
    pub from_amount: Money,
    pub to_amount: Money,
    pub change: Money,
    /// Change relative to `from_amount`; `None` when that is not positive
    pub basis_points: Option<i64>,
    pub kind: ChangeKind,
}

/// Classification of one transition. `None` when neither side is funded.
pub fn classify_change(from: Money, to: Money) -> Option<(ChangeKind, Option<i64>)> {
    match (from.is_positive(), to.is_positive()) {
        (false, false) => None,
        (false, true) => Some((ChangeKind::New, None)),
        (true, false) => Some((ChangeKind::Discontinued, None)),
        (true, true) => {
            let delta = i128::from((to - from).cents());
            let bps = (delta * 10_000 / i128::from(from.cents())) as i64;
            let kind = if bps > CHANGE_THRESHOLD_BPS {
                ChangeKind::Growth
            } else if bps < -CHANGE_THRESHOLD_BPS {
                ChangeKind::Cut
            } else {
                ChangeKind::Stable
            };
            Some((kind, Some(bps)))
        }
    }
}

// ============================================================================
// TIMELINE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// agency code -> biennium -> summed new amounts
    pub agencies: BTreeMap<String, BTreeMap<Biennium, Money>>,
    pub bills: usize,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one bill's aggregate. Unassigned biennium buckets are skipped.
    pub fn add_aggregate(&mut self, aggregate: &FiscalAggregate) {
        for (agency, by_biennium) in &aggregate.by_agency_biennium {
            for (label, totals) in by_biennium {
                let Ok(biennium) = Biennium::try_from(label.clone()) else {
                    continue;
                };
                self.record(agency, biennium, totals.new);
            }
        }
        self.bills += 1;
    }

    /// Add an amount to one agency x biennium cell
    pub fn record(&mut self, agency: &str, biennium: Biennium, amount: Money) {
        *self
            .agencies
            .entry(agency.to_string())
            .or_default()
            .entry(biennium)
            .or_default() += amount;
    }

    pub fn from_aggregates<'a, I>(aggregates: I) -> Self
    where
        I: IntoIterator<Item = &'a FiscalAggregate>,
    {
        let mut timeline = Timeline::new();
        for aggregate in aggregates {
            timeline.add_aggregate(aggregate);
        }
        timeline
    }

    /// Every biennium seen for any agency, ascending
    pub fn biennia(&self) -> Vec<Biennium> {
        let all: BTreeSet<Biennium> = self
            .agencies
            .values()
            .flat_map(|b| b.keys().copied())
            .collect();
        all.into_iter().collect()
    }

    pub fn amount(&self, agency: &str, biennium: Biennium) -> Money {
        self.agencies
            .get(agency)
            .and_then(|b| b.get(&biennium))
            .copied()
            .unwrap_or(Money::ZERO)
    }

    /// Classify every agency's transition between consecutive biennia.
    /// A biennium missing for an agency counts as unfunded.
    pub fn changes(&self) -> TimelineChanges {
        let biennia = self.biennia();
        let mut changes = TimelineChanges::default();

        for agency in self.agencies.keys() {
            for pair in biennia.windows(2) {
                let (from_biennium, to_biennium) = (pair[0], pair[1]);
                let from_amount = self.amount(agency, from_biennium);
                let to_amount = self.amount(agency, to_biennium);
                let Some((kind, basis_points)) = classify_change(from_amount, to_amount) else {
                    continue;
                };
                changes.push(FundingChange {
                    agency_code: agency.clone(),
                    from_biennium,
                    to_biennium,
                    from_amount,
                    to_amount,
                    change: to_amount - from_amount,
                    basis_points,
                    kind,
                });
            }
        }

        changes.sort();
        changes
    }
}

// ============================================================================
// CHANGE BUCKETS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineChanges {
    pub growth: Vec<FundingChange>,
    pub cuts: Vec<FundingChange>,
    pub new_programs: Vec<FundingChange>,
    pub discontinued: Vec<FundingChange>,
    pub stable: Vec<FundingChange>,
}

impl TimelineChanges {
    fn push(&mut self, change: FundingChange) {
        match change.kind {
            ChangeKind::Growth => self.growth.push(change),
            ChangeKind::Cut => self.cuts.push(change),
            ChangeKind::New => self.new_programs.push(change),
            ChangeKind::Discontinued => self.discontinued.push(change),
            ChangeKind::Stable => self.stable.push(change),
        }
    }

    /// Largest movements first
    fn sort(&mut self) {
        self.growth.sort_by(|a, b| b.change.abs().cmp(&a.change.abs()));
        self.cuts.sort_by(|a, b| b.change.abs().cmp(&a.change.abs()));
        self.new_programs.sort_by(|a, b| b.to_amount.cmp(&a.to_amount));
        self.discontinued.sort_by(|a, b| b.from_amount.cmp(&a.from_amount));
    }

    pub fn len(&self) -> usize {
        self.growth.len() + self.cuts.len() + self.new_programs.len() + self.discontinued.len() + self.stable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// TESTS
// ============================================================================
