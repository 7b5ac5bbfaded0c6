// ✂️ Amendment Resolver - Struck vs. added text to old/new/change amounts
//
// Amendatory sections show prior law struck through and new text inserted.
// A dollar amount node holds a sequence of styled runs; this module turns
// those runs into one consistent {old, new, change} triple.

use crate::money::{parse_money, Money, MoneyParseError};
use crate::schema::SchemaMapping;
use crate::tree::{DocumentTree, NodeId};
use serde::{Deserialize, Serialize};

// ============================================================================
// STYLED RUNS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmendingStyle {
    Strike,
    Add,
}

/// One run of literal text with its optional amending style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub style: Option<AmendingStyle>,
    pub text: String,
}

impl StyledRun {
    pub fn plain(text: &str) -> Self {
        StyledRun { style: None, text: text.to_string() }
    }

    pub fn strike(text: &str) -> Self {
        StyledRun { style: Some(AmendingStyle::Strike), text: text.to_string() }
    }

    pub fn add(text: &str) -> Self {
        StyledRun { style: Some(AmendingStyle::Add), text: text.to_string() }
    }
}

/// Style of a TextRun element, `None` when unstyled or unrecognized
pub fn style_of(tree: &DocumentTree, node: NodeId, mapping: &SchemaMapping) -> Option<AmendingStyle> {
    let value = tree.attribute(node, &mapping.attr_amending_style)?;
    if value.eq_ignore_ascii_case(&mapping.style_strike) {
        Some(AmendingStyle::Strike)
    } else if value.eq_ignore_ascii_case(&mapping.style_add) {
        Some(AmendingStyle::Add)
    } else {
        None
    }
}

/// Runs directly inside a dollar-amount node.
///
/// Returns an empty list when the node carries no TextRun children, so the
/// resolver falls back to the node's own text.
pub fn collect_runs(tree: &DocumentTree, node: NodeId, mapping: &SchemaMapping) -> Vec<StyledRun> {
    let has_runs = tree
        .element_children(node)
        .any(|c| tree.tag(c) == Some(mapping.text_run.as_str()));
    if !has_runs {
        return Vec::new();
    }

    tree.children(node)
        .iter()
        .map(|&child| match tree.text(child) {
            Some(text) => StyledRun::plain(text),
            None if tree.tag(child) == Some(mapping.text_run.as_str()) => StyledRun {
                style: style_of(tree, child, mapping),
                text: tree.text_content(child),
            },
            None => StyledRun::plain(&tree.text_content(child)),
        })
        .collect()
}

/// Text of `node` as it reads after amendment (struck runs removed)
pub fn current_text(tree: &DocumentTree, node: NodeId, mapping: &SchemaMapping) -> String {
    let mut out = String::new();
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        if let Some(text) = tree.text(id) {
            out.push_str(text);
            continue;
        }
        if tree.tag(id) == Some(mapping.text_run.as_str())
            && style_of(tree, id, mapping) == Some(AmendingStyle::Strike)
        {
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());
    }
    out
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Reconciled amounts of one dollar-amount node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAmount {
    pub old_amount: Option<Money>,
    pub new_amount: Option<Money>,
    pub change_amount: Option<Money>,
    pub is_amended: bool,
}

impl ResolvedAmount {
    /// A change that overflows the cents range is left absent and reported
    fn from_sides(
        old_amount: Option<Money>,
        new_amount: Option<Money>,
        is_amended: bool,
        errors: &mut Vec<MoneyParseError>,
    ) -> Self {
        let change_amount = match (old_amount, new_amount) {
            (Some(old), Some(new)) => {
                let change = new.checked_sub(old);
                if change.is_none() {
                    errors.push(MoneyParseError(format!("{} -> {}", old, new)));
                }
                change
            }
            _ => None,
        };
        ResolvedAmount { old_amount, new_amount, change_amount, is_amended }
    }

    /// True when any side could not be determined
    pub fn is_incomplete(&self) -> bool {
        self.old_amount.is_none() || self.new_amount.is_none()
    }
}

/// Reconcile styled runs into an amount triple.
///
/// * no runs: the node text is both old and new, not amended
/// * strike text is the old value, add text the new one
/// * unstyled text fills a side only when no styled run captured it
///
/// Unparsable literals leave their side absent and are returned as errors;
/// they are never read as zero.
pub fn resolve_amount(runs: &[StyledRun], node_text: &str) -> (ResolvedAmount, Vec<MoneyParseError>) {
    let mut errors = Vec::new();

    let runs: Vec<&StyledRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    if runs.is_empty() {
        let amount = parse_side(node_text, &mut errors);
        let resolved = ResolvedAmount::from_sides(amount, amount, false, &mut errors);
        return (resolved, errors);
    }

    let mut struck = String::new();
    let mut added = String::new();
    let mut plain = String::new();
    for run in &runs {
        match run.style {
            Some(AmendingStyle::Strike) => struck.push_str(&run.text),
            Some(AmendingStyle::Add) => added.push_str(&run.text),
            None => plain.push_str(&run.text),
        }
    }

    let is_amended = !struck.is_empty() || !added.is_empty();
    let old_text = if struck.is_empty() { &plain } else { &struck };
    let new_text = if added.is_empty() { &plain } else { &added };

    let old_amount = parse_side(old_text, &mut errors);
    let new_amount = parse_side(new_text, &mut errors);

    let resolved = ResolvedAmount::from_sides(old_amount, new_amount, is_amended, &mut errors);
    (resolved, errors)
}

/// A side with no digits at all is simply absent (e.g. a lone `$` filler)
fn parse_side(text: &str, errors: &mut Vec<MoneyParseError>) -> Option<Money> {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        if !text.trim().is_empty() && text.trim() != "$" {
            errors.push(MoneyParseError(text.trim().to_string()));
        }
        return None;
    }
    match parse_money(text) {
        Ok(m) => Some(m),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strike_then_add() {
        let runs = vec![StyledRun::strike("$1,000,000"), StyledRun::add("$1,200,000")];
        let (amount, errors) = resolve_amount(&runs, "$1,000,000$1,200,000");

        assert!(errors.is_empty());
        assert_eq!(amount.old_amount, Some(Money::from_dollars(1_000_000)));
        assert_eq!(amount.new_amount, Some(Money::from_dollars(1_200_000)));
        assert_eq!(amount.change_amount, Some(Money::from_dollars(200_000)));
        assert!(amount.is_amended);
        println!("✅ strike/add resolved to +$200,000");
    }

    #[test]
    fn test_zero_runs_falls_back_to_node_text() {
        let (amount, errors) = resolve_amount(&[], "$500,000");

        assert!(errors.is_empty());
        assert_eq!(amount.old_amount, Some(Money::from_dollars(500_000)));
        assert_eq!(amount.new_amount, Some(Money::from_dollars(500_000)));
        assert_eq!(amount.change_amount, Some(Money::ZERO));
        assert!(!amount.is_amended);
    }

    #[test]
    fn test_filler_run_does_not_overwrite_styled_value() {
        let runs = vec![
            StyledRun::plain("$"),
            StyledRun::strike("1,000"),
            StyledRun::plain("  "),
            StyledRun::add("2,500"),
        ];
        let (amount, errors) = resolve_amount(&runs, "");
        assert!(errors.is_empty());
        assert_eq!(amount.old_amount, Some(Money::from_dollars(1_000)));
        assert_eq!(amount.new_amount, Some(Money::from_dollars(2_500)));
    }

    #[test]
    fn test_strike_only_leaves_new_absent() {
        let (amount, errors) = resolve_amount(&[StyledRun::strike("$75,000")], "$75,000");
        assert!(errors.is_empty());
        assert_eq!(amount.old_amount, Some(Money::from_dollars(75_000)));
        assert_eq!(amount.new_amount, None);
        assert_eq!(amount.change_amount, None);
        assert!(amount.is_amended);
        assert!(amount.is_incomplete());
    }

    #[test]
    fn test_add_only_leaves_old_absent() {
        let (amount, _) = resolve_amount(&[StyledRun::add("$10")], "$10");
        assert_eq!(amount.old_amount, None);
        assert_eq!(amount.new_amount, Some(Money::from_dollars(10)));
        assert_eq!(amount.change_amount, None);
    }

    #[test]
    fn test_malformed_amount_is_absent_not_zero() {
        let (amount, errors) = resolve_amount(&[], "$12,3x4");
        assert_eq!(amount.old_amount, None);
        assert_eq!(amount.new_amount, None);
        assert_eq!(amount.change_amount, None);
        assert_eq!(errors.len(), 1);

        let (amount, errors) = resolve_amount(&[], "to be determined");
        assert_eq!(amount.new_amount, None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_change_overflow_is_reported_not_fatal() {
        let runs = vec![
            StyledRun::strike("($90,000,000,000,000,000)"),
            StyledRun::add("$90,000,000,000,000,000"),
        ];
        let (amount, errors) = resolve_amount(&runs, "");

        assert_eq!(amount.old_amount, Some(Money::from_dollars(-90_000_000_000_000_000)));
        assert_eq!(amount.new_amount, Some(Money::from_dollars(90_000_000_000_000_000)));
        assert_eq!(amount.change_amount, None);
        assert!(amount.is_amended);
        assert_eq!(errors.len(), 1);
        println!("✅ Overflowing change reported: {}", errors[0]);
    }

    #[test]
    fn test_collect_runs_and_current_text() {
        let mapping = SchemaMapping::default();
        let mut tree = DocumentTree::new("DollarAmount");
        let root = tree.root();
        let s = tree.append_element(root, "TextRun", &[("amendingStyle", "strike")]);
        tree.append_text(s, "$1,000,000");
        let a = tree.append_element(root, "TextRun", &[("amendingStyle", "add")]);
        tree.append_text(a, "$1,200,000");

        let runs = collect_runs(&tree, root, &mapping);
        assert_eq!(runs, vec![StyledRun::strike("$1,000,000"), StyledRun::add("$1,200,000")]);
        assert_eq!(current_text(&tree, root, &mapping), "$1,200,000");

        let mut bare = DocumentTree::new("DollarAmount");
        let bare_root = bare.root();
        bare.append_text(bare_root, "$500,000");
        assert!(collect_runs(&bare, bare_root, &mapping).is_empty());
    }
}
