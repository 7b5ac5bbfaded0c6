// 💰 Appropriation Extractor - Appropriations groups to typed line items
//
// Consumes Appropriations nodes plus the walker's context index. Every
// Appropriation row becomes an item with resolved amounts and an inferred
// fiscal period; total and subtotal rows are kept but flagged so the
// aggregator never re-sums them.

use crate::amendment::{collect_runs, current_text, resolve_amount, ResolvedAmount};
use crate::error::{ExtractionWarning, Warnings};
use crate::fiscal_period::{infer_fiscal_period, Biennium};
use crate::schema::{NodeRole, SchemaAdapter};
use crate::tree::{collapse_whitespace, DocumentTree, NodeId};
use crate::walker::ContextIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const TOTAL_LABEL: &str = "TOTAL APPROPRIATION";
pub const SUBTOTAL_LABEL: &str = "SUBTOTAL";

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>").unwrap_or_else(|e| panic!("invalid tag pattern: {e}"))
});

static FISCAL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\((?:FY|fiscal\s+year)\s*\d{4}\)")
        .unwrap_or_else(|e| panic!("invalid fiscal tag pattern: {e}"))
});

static ACCOUNT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d{3}[A-Z]?)\)|^(\d{3}[A-Z]?)-")
        .unwrap_or_else(|e| panic!("invalid account code pattern: {e}"))
});

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppropriationKind {
    Appropriation,
    Reappropriation,
    Biennia,
    Other(String),
}

impl AppropriationKind {
    pub fn as_str(&self) -> &str {
        match self {
            AppropriationKind::Appropriation => "appropriation",
            AppropriationKind::Reappropriation => "reappropriation",
            AppropriationKind::Biennia => "biennia",
            AppropriationKind::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for AppropriationKind {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "appropriation" => AppropriationKind::Appropriation,
            "reappropriation" => AppropriationKind::Reappropriation,
            "biennia" | "priorbiennia" | "prior biennia" => AppropriationKind::Biennia,
            _ => AppropriationKind::Other(value.trim().to_string()),
        }
    }
}

impl TryFrom<String> for AppropriationKind {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(AppropriationKind::from(value.as_str()))
    }
}

impl From<AppropriationKind> for String {
    fn from(kind: AppropriationKind) -> String {
        kind.as_str().to_string()
    }
}

/// Source of the money behind an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    State,
    Federal,
    PrivateLocal,
    Unknown,
}

impl AccountType {
    pub fn classify(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("federal") {
            AccountType::Federal
        } else if lower.contains("private") || lower.contains("local") {
            AccountType::PrivateLocal
        } else if lower.contains("state") {
            AccountType::State
        } else {
            AccountType::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundType {
    GeneralFund,
    TrustFund,
    SpecialFund,
}

impl FundType {
    pub fn classify(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("general fund") {
            FundType::GeneralFund
        } else if lower.contains("trust") {
            FundType::TrustFund
        } else {
            FundType::SpecialFund
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::GeneralFund => "General Fund",
            FundType::TrustFund => "Trust Fund",
            FundType::SpecialFund => "Special Fund",
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppropriationItem {
    /// Raw label text, struck runs included
    pub account_label: String,
    /// Label as it reads after amendment, with tags removed, typographic
    /// dashes folded to `-` and whitespace collapsed
    pub normalized_label: String,
    /// Normalized label without the fiscal year tag or trailing
    /// "Appropriation"; the per-account summation key
    pub account_name: String,
    pub account_code: Option<String>,
    pub account_type: Option<AccountType>,
    pub fund_type: Option<FundType>,
    pub fiscal_year: Option<i32>,
    pub biennium: Option<Biennium>,
    #[serde(flatten)]
    pub amount: ResolvedAmount,
    pub is_total_row: bool,
    pub section_number: Option<String>,
    pub agency_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppropriationGroup {
    pub agency_code: Option<String>,
    pub project_code: Option<String>,
    pub kind: AppropriationKind,
    pub section_number: Option<String>,
    /// Line items and total rows, document order
    pub items: Vec<AppropriationItem>,
}

impl AppropriationGroup {
    pub fn line_items(&self) -> impl Iterator<Item = &AppropriationItem> {
        self.items.iter().filter(|i| !i.is_total_row)
    }

    /// Declared `TOTAL APPROPRIATION` row
    pub fn total(&self) -> Option<&AppropriationItem> {
        self.items
            .iter()
            .find(|i| i.is_total_row && i.account_label == TOTAL_LABEL)
    }

    pub fn subtotals(&self) -> impl Iterator<Item = &AppropriationItem> {
        self.items
            .iter()
            .filter(|i| i.is_total_row && i.account_label == SUBTOTAL_LABEL)
    }
}

// ============================================================================
// LABEL HELPERS
// ============================================================================

/// Strip markup, fold typographic dashes to `-`, collapse whitespace
pub fn normalize_label(raw: &str) -> String {
    let without_tags = MARKUP_TAG.replace_all(raw, " ");
    let folded: String = without_tags
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            other => other,
        })
        .collect();
    collapse_whitespace(&folded)
}

/// `General Fund-State Appropriation (FY 2024)` → `General Fund-State`
pub fn account_name(normalized: &str) -> String {
    let stripped = FISCAL_TAG.replace_all(normalized, "");
    let trimmed = stripped.trim();
    let trimmed = trimmed
        .strip_suffix("Appropriation")
        .or_else(|| trimmed.strip_suffix("appropriation"))
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

pub fn account_code(normalized: &str) -> Option<String> {
    let caps = ACCOUNT_CODE.captures(normalized)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct AppropriationExtractor<'a> {
    tree: &'a DocumentTree,
    index: &'a ContextIndex,
    schema: &'a dyn SchemaAdapter,
}

impl<'a> AppropriationExtractor<'a> {
    pub fn new(
        tree: &'a DocumentTree,
        index: &'a ContextIndex,
        schema: &'a dyn SchemaAdapter,
    ) -> Self {
        AppropriationExtractor { tree, index, schema }
    }

    /// Extract one Appropriations node.
    ///
    /// A group outside any section is reported and skipped. Rows missing an
    /// account or amount are reported and skipped; the rest of the group
    /// continues.
    pub fn extract_group(&self, group: NodeId, warnings: &mut Warnings) -> Option<AppropriationGroup> {
        let mapping = self.schema.mapping();
        let ctx = self.index.context(group);

        if self.index.section_of(group).is_none() {
            warnings.push(ExtractionWarning::MissingSectionContext {
                section_number: None,
                detail: "appropriations group outside any bill section".to_string(),
            });
            return None;
        }

        let agency_code = self
            .tree
            .attribute(group, &mapping.attr_agency)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .or(ctx.agency_code.clone());
        let project_code = self
            .tree
            .attribute(group, &mapping.attr_project)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let kind = AppropriationKind::from(
            self.tree.attribute(group, &mapping.attr_approp_type).unwrap_or(""),
        );

        let mut out = AppropriationGroup {
            agency_code,
            project_code,
            kind,
            section_number: ctx.section_number.clone(),
            items: Vec::new(),
        };

        for row in self.rows(group) {
            let role = self.tree.tag(row).map(|t| self.schema.role_of(t));
            let item = match role {
                Some(NodeRole::Appropriation) => self.line_item(row, &out, warnings),
                Some(NodeRole::AppropriationTotal) => self.total_row(row, TOTAL_LABEL, &out, warnings),
                Some(NodeRole::AppropriationSubTotal) => self.total_row(row, SUBTOTAL_LABEL, &out, warnings),
                _ => None,
            };
            out.items.extend(item);
        }

        tracing::debug!(
            section = out.section_number.as_deref().unwrap_or("?"),
            items = out.items.len(),
            "appropriations group extracted"
        );
        Some(out)
    }

    /// Row nodes of a group in document order, not descending into rows or
    /// nested groups
    fn rows(&self, group: NodeId) -> Vec<NodeId> {
        let mut rows = Vec::new();
        let mut stack: Vec<NodeId> = self.tree.element_children(group).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            let role = self.tree.tag(id).map(|t| self.schema.role_of(t));
            match role {
                Some(NodeRole::Appropriation | NodeRole::AppropriationTotal | NodeRole::AppropriationSubTotal) => {
                    rows.push(id)
                }
                Some(NodeRole::Appropriations) => {}
                _ => {
                    let mut kids: Vec<NodeId> = self.tree.element_children(id).collect();
                    kids.reverse();
                    stack.extend(kids);
                }
            }
        }
        rows
    }

    fn line_item(
        &self,
        row: NodeId,
        group: &AppropriationGroup,
        warnings: &mut Warnings,
    ) -> Option<AppropriationItem> {
        let mapping = self.schema.mapping();
        let account = self.tree.find_descendant(row, &mapping.account_name);
        let dollars = self.tree.find_descendant(row, &mapping.dollar_amount);

        let label = account
            .map(|a| collapse_whitespace(&current_text(self.tree, a, mapping)))
            .filter(|l| !l.is_empty());

        let (account, label, dollars) = match (account, label, dollars) {
            (Some(account), Some(label), Some(dollars)) => (account, label, dollars),
            (_, label, dollars) => {
                let missing = if label.is_none() && dollars.is_none() {
                    "account name and dollar amount"
                } else if label.is_none() {
                    "account name"
                } else {
                    "dollar amount"
                };
                warnings.push(ExtractionWarning::MissingSectionContext {
                    section_number: group.section_number.clone(),
                    detail: format!("appropriation row has no {}", missing),
                });
                return None;
            }
        };

        let amount = self.resolve(dollars, group, warnings);

        let period = infer_fiscal_period(&label);
        if period.is_unknown() {
            warnings.push(ExtractionWarning::AmbiguousFiscalPeriod {
                section_number: group.section_number.clone(),
                label: label.clone(),
            });
        }

        let normalized = normalize_label(&label);
        let raw_label = collapse_whitespace(&self.tree.text_content(account));
        Some(AppropriationItem {
            account_name: account_name(&normalized),
            account_code: account_code(&normalized),
            account_type: Some(AccountType::classify(&normalized)),
            fund_type: Some(FundType::classify(&normalized)),
            fiscal_year: period.fiscal_year,
            biennium: period.biennium,
            account_label: raw_label,
            normalized_label: normalized,
            amount,
            is_total_row: false,
            section_number: group.section_number.clone(),
            agency_code: group.agency_code.clone(),
        })
    }

    fn total_row(
        &self,
        row: NodeId,
        label: &str,
        group: &AppropriationGroup,
        warnings: &mut Warnings,
    ) -> Option<AppropriationItem> {
        let mapping = self.schema.mapping();
        let Some(dollars) = self.tree.find_descendant(row, &mapping.dollar_amount) else {
            warnings.push(ExtractionWarning::MissingSectionContext {
                section_number: group.section_number.clone(),
                detail: format!("{} row has no dollar amount", label.to_lowercase()),
            });
            return None;
        };

        let amount = self.resolve(dollars, group, warnings);
        Some(AppropriationItem {
            account_label: label.to_string(),
            normalized_label: label.to_string(),
            account_name: label.to_string(),
            account_code: None,
            account_type: None,
            fund_type: None,
            fiscal_year: None,
            biennium: None,
            amount,
            is_total_row: true,
            section_number: group.section_number.clone(),
            agency_code: group.agency_code.clone(),
        })
    }

    fn resolve(&self, dollars: NodeId, group: &AppropriationGroup, warnings: &mut Warnings) -> ResolvedAmount {
        let mapping = self.schema.mapping();
        let runs = collect_runs(self.tree, dollars, mapping);
        let text = self.tree.text_content(dollars);
        let (amount, errors) = resolve_amount(&runs, &text);
        for e in errors {
            warnings.push(ExtractionWarning::MalformedAmount {
                section_number: group.section_number.clone(),
                literal: e.0,
            });
        }
        amount
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::schema::LegislativeSchema;

    struct Fixture {
        tree: DocumentTree,
        group: NodeId,
    }

    fn row(tree: &mut DocumentTree, group: NodeId, label: &str, amount: &str) {
        let r = tree.append_element(group, "Appropriation", &[]);
        let a = tree.append_element(r, "AccountName", &[]);
        tree.append_text(a, label);
        let d = tree.append_element(r, "DollarAmount", &[]);
        tree.append_text(d, amount);
    }

    fn fixture() -> Fixture {
        let mut tree = DocumentTree::new("Bill");
        let body = tree.append_element(tree.root(), "BillBody", &[]);
        let s = tree.append_element(body, "BillSection", &[]);
        let h = tree.append_element(s, "BillSectionHeader", &[]);
        let n = tree.append_element(h, "BillSectionNumber", &[]);
        let v = tree.append_element(n, "Value", &[]);
        tree.append_text(v, "101.");
        let group = tree.append_element(s, "Appropriations", &[("agency", "011"), ("appropType", "appropriation")]);

        row(&mut tree, group, "General Fund\u{2014}State Appropriation (FY 2024)", "$12,000,000");
        row(&mut tree, group, "General Fund\u{2014}State Appropriation (FY 2025)", "$13,000,000");
        row(&mut tree, group, "Pension Funding Stabilization Account\u{2014}State Appropriation", "$500,000");

        let total = tree.append_element(group, "AppropriationTotal", &[]);
        let d = tree.append_element(total, "DollarAmount", &[]);
        tree.append_text(d, "$25,500,000");

        Fixture { tree, group }
    }

    fn extract(f: &Fixture) -> (Option<AppropriationGroup>, Warnings) {
        let schema = LegislativeSchema::new();
        let mut warnings = Warnings::new();
        let index = ContextIndex::build(&f.tree, &schema, &mut warnings).unwrap();
        let extractor = AppropriationExtractor::new(&f.tree, &index, &schema);
        let group = extractor.extract_group(f.group, &mut warnings);
        (group, warnings)
    }

    #[test]
    fn test_group_items_and_total() {
        let f = fixture();
        let (group, warnings) = extract(&f);
        let group = group.unwrap();

        assert_eq!(group.agency_code.as_deref(), Some("011"));
        assert_eq!(group.section_number.as_deref(), Some("101"));
        assert_eq!(group.kind, AppropriationKind::Appropriation);
        assert_eq!(group.items.len(), 4);
        assert_eq!(group.line_items().count(), 3);

        let first = &group.items[0];
        assert_eq!(first.normalized_label, "General Fund-State Appropriation (FY 2024)");
        assert_eq!(first.account_name, "General Fund-State");
        assert_eq!(first.fiscal_year, Some(2024));
        assert_eq!(first.biennium, Some(Biennium::new(2023, 2025)));
        assert_eq!(first.fund_type, Some(FundType::GeneralFund));
        assert_eq!(first.account_type, Some(AccountType::State));
        assert_eq!(first.amount.new_amount, Some(Money::from_dollars(12_000_000)));

        let total = group.total().unwrap();
        assert!(total.is_total_row);
        assert_eq!(total.account_label, TOTAL_LABEL);
        assert_eq!(total.amount.new_amount, Some(Money::from_dollars(25_500_000)));

        // The un-tagged account row has no fiscal period
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.iter().next().map(|w| w.kind()), Some("ambiguousFiscalPeriod"));
        println!("✅ {} rows extracted from section 101", group.items.len());
    }

    #[test]
    fn test_amended_label_keeps_raw_text() {
        let mut f = fixture();
        let r = f.tree.append_element(f.group, "Appropriation", &[]);
        let a = f.tree.append_element(r, "AccountName", &[]);
        f.tree.append_text(a, "General Fund\u{2014}State Appropriation (FY ");
        let struck = f.tree.append_element(a, "TextRun", &[("amendingStyle", "strike")]);
        f.tree.append_text(struck, "2023");
        let added = f.tree.append_element(a, "TextRun", &[("amendingStyle", "add")]);
        f.tree.append_text(added, "2024");
        f.tree.append_text(a, ")");
        let d = f.tree.append_element(r, "DollarAmount", &[]);
        f.tree.append_text(d, "$1,000");

        let (group, _) = extract(&f);
        let group = group.unwrap();
        let item = group.line_items().last().unwrap();

        assert!(item.account_label.contains("2023"));
        assert!(item.account_label.contains("2024"));
        assert_eq!(item.normalized_label, "General Fund-State Appropriation (FY 2024)");
        assert_eq!(item.account_name, "General Fund-State");
        assert_eq!(item.fiscal_year, Some(2024));
        println!("✅ raw label kept, amended label normalized: {}", item.account_label);
    }

    #[test]
    fn test_row_missing_amount_is_skipped() {
        let mut f = fixture();
        let r = f.tree.append_element(f.group, "Appropriation", &[]);
        let a = f.tree.append_element(r, "AccountName", &[]);
        f.tree.append_text(a, "Motor Vehicle Account\u{2014}State Appropriation");

        let (group, warnings) = extract(&f);
        assert_eq!(group.unwrap().items.len(), 4);
        assert!(warnings
            .iter()
            .any(|w| w.kind() == "missingSectionContext" && w.section_number() == Some("101")));
    }

    #[test]
    fn test_malformed_amount_is_absent() {
        let mut f = fixture();
        row(&mut f.tree, f.group, "General Fund\u{2014}Federal Appropriation (FY 2024)", "$4,0x0");

        let (group, warnings) = extract(&f);
        let group = group.unwrap();
        let bad = group.items.iter().find(|i| i.account_type == Some(AccountType::Federal)).unwrap();
        assert_eq!(bad.amount.new_amount, None);
        assert_eq!(bad.amount.old_amount, None);
        assert!(warnings.iter().any(|w| w.kind() == "malformedAmount"));
    }

    #[test]
    fn test_orphan_group_is_reported() {
        let mut tree = DocumentTree::new("Bill");
        let body = tree.append_element(tree.root(), "BillBody", &[]);
        let group = tree.append_element(body, "Appropriations", &[]);
        let f = Fixture { tree, group };

        let (result, warnings) = extract(&f);
        assert!(result.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_label_helpers() {
        assert_eq!(normalize_label("General Fund\u{2014}State  <b>Appropriation</b>"), "General Fund-State Appropriation");
        assert_eq!(account_name("Aquatic Lands Enhancement Account-State Appropriation"), "Aquatic Lands Enhancement Account-State");
        assert_eq!(account_code("General Fund (001) Appropriation"), Some("001".to_string()));
        assert_eq!(account_code("08A-State Drought Preparedness"), None);
        assert_eq!(account_code("001-1 General Fund"), Some("001".to_string()));
        assert_eq!(AppropriationKind::from("Reappropriation"), AppropriationKind::Reappropriation);
        assert_eq!(AppropriationKind::from("capital").as_str(), "capital");
        assert_eq!(FundType::classify("Public Employees' Retirement Trust Account"), FundType::TrustFund);
        assert_eq!(AccountType::classify("General Fund-Private/Local"), AccountType::PrivateLocal);
    }
}
