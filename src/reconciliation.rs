// ⚖️ Reconciliation Engine - Declared totals vs. summed line items
//
// Formula, per appropriations group:
//   sum(item.newAmount for non-total rows) = TOTAL APPROPRIATION.newAmount
//
// Report-only: drift is flagged, the fiscal aggregate is never touched.

use crate::appropriations::AppropriationGroup;
use crate::money::Money;
use serde::{Deserialize, Serialize};

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReconciliationResult {
    /// Line items add up to the declared total
    Balanced { total: Money },

    /// Line items and declared total disagree beyond tolerance
    #[serde(rename_all = "camelCase")]
    Drift {
        expected: Money,
        actual: Money,
        difference: Money,
    },

    /// Some amount needed for the check is absent
    #[serde(rename_all = "camelCase")]
    Incomplete { missing_amounts: usize },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn has_drift(&self) -> bool {
        matches!(self, ReconciliationResult::Drift { .. })
    }

    pub fn difference(&self) -> Money {
        match self {
            ReconciliationResult::Drift { difference, .. } => *difference,
            _ => Money::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReconciliation {
    pub section_number: Option<String>,
    pub agency_code: Option<String>,
    pub line_count: usize,
    pub result: ReconciliationResult,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub groups: Vec<GroupReconciliation>,
    pub balanced: usize,
    pub drifted: usize,
    pub incomplete: usize,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.drifted == 0 && self.incomplete == 0
    }

    pub fn drifts(&self) -> impl Iterator<Item = &GroupReconciliation> {
        self.groups.iter().filter(|g| g.result.has_drift())
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} groups checked, {} balanced, {} drifted, {} incomplete",
            self.groups.len(),
            self.balanced,
            self.drifted,
            self.incomplete
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    /// Largest difference still reported as balanced (default: $0)
    pub tolerance: Money,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine { tolerance: Money::ZERO }
    }

    pub fn with_tolerance(tolerance: Money) -> Self {
        ReconciliationEngine { tolerance }
    }

    /// Check one group. `None` when the group has no total row or no
    /// line items to compare.
    pub fn reconcile_group(&self, group: &AppropriationGroup) -> Option<GroupReconciliation> {
        let total = group.total()?;
        let lines: Vec<_> = group.line_items().collect();
        if lines.is_empty() {
            return None;
        }

        let missing = lines.iter().filter(|i| i.amount.new_amount.is_none()).count()
            + usize::from(total.amount.new_amount.is_none());

        let result = match total.amount.new_amount {
            Some(expected) if missing == 0 => {
                let actual: Money = lines.iter().filter_map(|i| i.amount.new_amount).sum();
                let difference = actual - expected;
                if difference.abs() <= self.tolerance {
                    ReconciliationResult::Balanced { total: expected }
                } else {
                    tracing::debug!(
                        section = group.section_number.as_deref().unwrap_or("?"),
                        %expected,
                        %actual,
                        "appropriation total drift"
                    );
                    ReconciliationResult::Drift { expected, actual, difference }
                }
            }
            _ => ReconciliationResult::Incomplete { missing_amounts: missing },
        };

        Some(GroupReconciliation {
            section_number: group.section_number.clone(),
            agency_code: group.agency_code.clone(),
            line_count: lines.len(),
            result,
        })
    }

    pub fn reconcile(&self, groups: &[AppropriationGroup]) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        for checked in groups.iter().filter_map(|g| self.reconcile_group(g)) {
            match checked.result {
                ReconciliationResult::Balanced { .. } => report.balanced += 1,
                ReconciliationResult::Drift { .. } => report.drifted += 1,
                ReconciliationResult::Incomplete { .. } => report.incomplete += 1,
            }
            report.groups.push(checked);
        }
        report
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
