// 📊 Fiscal Aggregator - Line items to nested fiscal summaries
//
// A single fold over every appropriation item. Total and subtotal rows
// never enter a sum; absent amounts add nothing and are counted as
// incomplete instead of being read as zero.

use crate::appropriations::{AppropriationGroup, AppropriationItem};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket name for items with no agency
pub const UNGROUPED: &str = "ungrouped";
/// Bucket name for items with no fiscal year or biennium
pub const UNASSIGNED: &str = "unassigned";

// ============================================================================
// TOTALS
// ============================================================================

/// Running `{old, new, change}` sums of one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub old: Money,
    pub new: Money,
    pub change: Money,
    pub line_count: usize,
    /// Lines with at least one absent amount
    pub incomplete: usize,
}

impl Totals {
    pub fn add_item(&mut self, item: &AppropriationItem) {
        let amount = &item.amount;
        if let Some(old) = amount.old_amount {
            self.old += old;
        }
        if let Some(new) = amount.new_amount {
            self.new += new;
        }
        if let Some(change) = amount.change_amount {
            self.change += change;
        }
        self.line_count += 1;
        if amount.is_incomplete() {
            self.incomplete += 1;
        }
    }

    pub fn merge(&mut self, other: &Totals) {
        self.old += other.old;
        self.new += other.new;
        self.change += other.change;
        self.line_count += other.line_count;
        self.incomplete += other.incomplete;
    }
}

// ============================================================================
// FISCAL AGGREGATE
// ============================================================================

/// Nested per-dimension sums of one bill (or several, after `merge`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalAggregate {
    pub grand_total: Totals,
    pub by_agency: BTreeMap<String, Totals>,
    pub by_account: BTreeMap<String, Totals>,
    pub by_fund_type: BTreeMap<String, Totals>,
    pub by_fiscal_year: BTreeMap<String, Totals>,
    pub by_biennium: BTreeMap<String, Totals>,
    pub by_agency_biennium: BTreeMap<String, BTreeMap<String, Totals>>,
    /// Total/subtotal rows seen and left out of every sum
    pub excluded_total_rows: usize,
}

impl FiscalAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one item. Total rows are counted and skipped.
    pub fn add_item(&mut self, item: &AppropriationItem) {
        if item.is_total_row {
            self.excluded_total_rows += 1;
            return;
        }

        let agency = item.agency_code.clone().unwrap_or_else(|| UNGROUPED.to_string());
        let fund = item
            .fund_type
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| UNASSIGNED.to_string());
        let fiscal_year = item
            .fiscal_year
            .map(|fy| fy.to_string())
            .unwrap_or_else(|| UNASSIGNED.to_string());
        let biennium = item
            .biennium
            .map(|b| b.to_string())
            .unwrap_or_else(|| UNASSIGNED.to_string());

        self.grand_total.add_item(item);
        self.by_agency.entry(agency.clone()).or_default().add_item(item);
        self.by_account.entry(item.account_name.clone()).or_default().add_item(item);
        self.by_fund_type.entry(fund).or_default().add_item(item);
        self.by_fiscal_year.entry(fiscal_year).or_default().add_item(item);
        self.by_biennium.entry(biennium.clone()).or_default().add_item(item);
        self.by_agency_biennium
            .entry(agency)
            .or_default()
            .entry(biennium)
            .or_default()
            .add_item(item);
    }

    /// Single pass over a flat item list
    pub fn fold<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a AppropriationItem>,
    {
        let mut aggregate = FiscalAggregate::new();
        for item in items {
            aggregate.add_item(item);
        }
        aggregate
    }

    pub fn from_groups(groups: &[AppropriationGroup]) -> Self {
        Self::fold(groups.iter().flat_map(|g| g.items.iter()))
    }

    /// Combine two aggregates (cross-bill reduction)
    pub fn merge(&mut self, other: &FiscalAggregate) {
        fn merge_map(into: &mut BTreeMap<String, Totals>, from: &BTreeMap<String, Totals>) {
            for (key, totals) in from {
                into.entry(key.clone()).or_default().merge(totals);
            }
        }

        self.grand_total.merge(&other.grand_total);
        merge_map(&mut self.by_agency, &other.by_agency);
        merge_map(&mut self.by_account, &other.by_account);
        merge_map(&mut self.by_fund_type, &other.by_fund_type);
        merge_map(&mut self.by_fiscal_year, &other.by_fiscal_year);
        merge_map(&mut self.by_biennium, &other.by_biennium);
        for (agency, by_biennium) in &other.by_agency_biennium {
            merge_map(self.by_agency_biennium.entry(agency.clone()).or_default(), by_biennium);
        }
        self.excluded_total_rows += other.excluded_total_rows;
    }
}

// ============================================================================
// TESTS
// ============================================================================
