// 📜 Proviso Classifier - Rules as data for conditions and limitations
//
// Segments a section's paragraphs into provisos and tags each one with
// every category whose patterns match. Categories are not exclusive.

use crate::amendment::current_text;
use crate::error::{ExtractionWarning, Warnings};
use crate::money::{find_money_literals, parse_money, Money};
use crate::schema::SchemaAdapter;
use crate::tree::{collapse_whitespace, DocumentTree};
use crate::walker::SectionFrame;
use anyhow::{Context as AnyhowContext, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const GENERAL_CATEGORY: &str = "General";

static PROVISO_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)subject to the following conditions and limitations:?")
        .unwrap_or_else(|e| panic!("invalid trigger pattern: {e}"))
});

static PROVISO_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\((\d+)\)").unwrap_or_else(|e| panic!("invalid proviso number pattern: {e}"))
});

static PROVIDED_SOLELY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bprovided\s+solely\b").unwrap_or_else(|e| panic!("invalid pattern: {e}"))
});

static FTE_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:FTEs?\b|full[- ]time[- ]equivalent)|\bFTEs?:\s*(\d+(?:\.\d+)?)")
        .unwrap_or_else(|e| panic!("invalid FTE pattern: {e}"))
});

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category label assigned on match
    pub category: String,

    /// Regex patterns, matched case-insensitively (use `(?-i)` to opt out)
    pub patterns: Vec<String>,

    /// Notes about this rule
    #[serde(default)]
    pub description: Option<String>,
}

/// Category table, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisoRuleSet {
    pub rules: Vec<CategoryRule>,
}

impl ProvisoRuleSet {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read proviso rules: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse proviso rules JSON")
    }
}

impl Default for ProvisoRuleSet {
    fn default() -> Self {
        let rule = |category: &str, patterns: &[&str]| CategoryRule {
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            description: None,
        };

        ProvisoRuleSet {
            rules: vec![
                rule("FTE restrictions", &[
                    r"\bFTEs?\b",
                    r"full.time.equivalent",
                    r"staffing",
                    r"\bpositions\b",
                    r"staff(?:ing)?\s+limit",
                ]),
                rule("Reporting requirements", &[
                    r"\breport(?:s|ing)?\b",
                    r"submit.*to.*legislature",
                    r"\bsubmit.*\bby\b",
                    r"shall provide.*information",
                    r"quarterly report",
                    r"annual report",
                ]),
                rule("IT constraints", &[
                    r"information technology",
                    r"(?-i)\bIT\b",
                    r"\bsoftware\b",
                    r"\bhardware\b",
                    r"\bcomputer",
                    r"systems?\s+(?:upgrade|replacement|development)",
                    r"data\s+(?:management|system)",
                ]),
                rule("Pilots", &[
                    r"\bpilot\b",
                    r"demonstration project",
                    r"test\s+(?:program|project)",
                ]),
                rule("Transfers", &[r"\btransfer", r"reappropriat"]),
                rule("Conditional appropriations", &[
                    r"if.*bill.*not enacted",
                    r"if.*bill.*is enacted",
                    r"shall lapse",
                    r"provided solely",
                    r"contingent",
                ]),
                rule("Study requirements", &[
                    r"\bstudy\b",
                    r"\banalysis\b",
                    r"\bevaluation\b",
                    r"\bassess(?:ment)?\b",
                    r"\bexamine\b",
                    r"review.*and.*report",
                ]),
                rule("Grant programs", &[
                    r"\bgrants?\b",
                    r"\bawards?\b",
                    r"distribute.*\bto\b",
                    r"allocation.*\bto\b",
                ]),
            ],
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
struct CompiledCategory {
    category: String,
    patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct ProvisoClassifier {
    categories: Vec<CompiledCategory>,
}

impl ProvisoClassifier {
    /// Classifier with the built-in category table
    pub fn new() -> Self {
        Self::from_rules(&ProvisoRuleSet::default())
            .unwrap_or_else(|e| panic!("built-in proviso rules are invalid: {e:#}"))
    }

    /// Compile a rule set; any invalid regex is a load error
    pub fn from_rules(rules: &ProvisoRuleSet) -> Result<Self> {
        let mut categories = Vec::with_capacity(rules.rules.len());
        for rule in &rules.rules {
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for pattern in &rule.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid pattern {:?} in category {:?}", pattern, rule.category))?;
                patterns.push(regex);
            }
            categories.push(CompiledCategory { category: rule.category.clone(), patterns });
        }
        Ok(ProvisoClassifier { categories })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_rules(&ProvisoRuleSet::from_file(path)?)
    }

    /// Every matching category in table order, or `["General"]`
    pub fn classify(&self, text: &str) -> Vec<String> {
        let matched: Vec<String> = self
            .categories
            .iter()
            .filter(|c| c.patterns.iter().any(|p| p.is_match(text)))
            .map(|c| c.category.clone())
            .collect();

        if matched.is_empty() {
            vec![GENERAL_CATEGORY.to_string()]
        } else {
            matched
        }
    }

    pub fn rule_count(&self) -> usize {
        self.categories.len()
    }
}

impl Default for ProvisoClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DollarReference {
    pub literal: String,
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proviso {
    pub section_number: String,
    pub agency_code: Option<String>,
    /// `(n)` paragraph number, `None` for an unnumbered proviso
    pub number: Option<u32>,
    pub text: String,
    pub dollar_references: Vec<DollarReference>,
    pub categories: Vec<String>,
    pub provided_solely: bool,
    pub fte_mentions: Vec<f64>,
}

/// Segment paragraphs into `(number, text)` provisos.
///
/// Nothing counts until the conditions-and-limitations trigger. Numbered
/// paragraphs open a proviso; anything else continues the open one. Text
/// after the trigger in the same paragraph opens an unnumbered proviso.
pub fn segment_provisos<S: AsRef<str>>(paragraphs: &[S]) -> Vec<(Option<u32>, String)> {
    let mut out: Vec<(Option<u32>, String)> = Vec::new();
    let mut active = false;

    for para in paragraphs {
        let text = para.as_ref().trim();
        if text.is_empty() {
            continue;
        }

        if !active {
            if let Some(m) = PROVISO_TRIGGER.find(text) {
                active = true;
                let tail = text[m.end()..].trim();
                if !tail.is_empty() {
                    open_or_continue(&mut out, tail);
                }
            }
            continue;
        }

        open_or_continue(&mut out, text);
    }

    out
}

fn open_or_continue(out: &mut Vec<(Option<u32>, String)>, text: &str) {
    if let Some(caps) = PROVISO_NUMBER.captures(text) {
        out.push((caps[1].parse().ok(), text.to_string()));
        return;
    }
    match out.last_mut() {
        Some((_, open)) => {
            open.push(' ');
            open.push_str(text);
        }
        None => out.push((None, text.to_string())),
    }
}

/// FTE counts mentioned in text (`12.5 FTE`, `FTEs: 3`)
pub fn fte_mentions(text: &str) -> Vec<f64> {
    FTE_MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Currency literals in text, each parsed when possible
pub fn dollar_references(text: &str) -> Vec<DollarReference> {
    find_money_literals(text)
        .into_iter()
        .map(|lit| DollarReference {
            literal: lit.to_string(),
            amount: parse_money(lit).ok(),
        })
        .collect()
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Provisos of one section.
///
/// A section without a number cannot own provisos; they are reported and
/// skipped.
pub fn extract_section_provisos(
    tree: &DocumentTree,
    frame: &SectionFrame,
    schema: &dyn SchemaAdapter,
    classifier: &ProvisoClassifier,
    warnings: &mut Warnings,
) -> Vec<Proviso> {
    let mapping = schema.mapping();
    let paragraphs: Vec<String> = frame
        .paragraphs
        .iter()
        .map(|&p| collapse_whitespace(&current_text(tree, p, mapping)))
        .collect();

    let segments = segment_provisos(&paragraphs);
    if segments.is_empty() {
        return Vec::new();
    }

    let Some(section_number) = frame.number.clone() else {
        warnings.push(ExtractionWarning::MissingSectionContext {
            section_number: None,
            detail: format!("{} provisos in a section with no number", segments.len()),
        });
        return Vec::new();
    };

    segments
        .into_iter()
        .map(|(number, text)| Proviso {
            section_number: section_number.clone(),
            agency_code: frame.agency_code().map(str::to_string),
            number,
            dollar_references: dollar_references(&text),
            categories: classifier.classify(&text),
            provided_solely: PROVIDED_SOLELY.is_match(&text),
            fte_mentions: fte_mentions(&text),
            text,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LegislativeSchema;
    use crate::walker::ContextIndex;
    use std::io::Write;

    #[test]
    fn test_reporting_requirement() {
        let classifier = ProvisoClassifier::new();
        let cats = classifier.classify(
            "The department shall submit a report to the legislature by December 1, 2025.",
        );
        assert!(cats.contains(&"Reporting requirements".to_string()));
        println!("✅ Categories: {:?}", cats);
    }

    #[test]
    fn test_no_match_is_general() {
        let classifier = ProvisoClassifier::new();
        let cats = classifier.classify("The office may adopt rules as necessary.");
        assert_eq!(cats, vec!["General".to_string()]);
    }

    #[test]
    fn test_multi_label() {
        let classifier = ProvisoClassifier::new();
        let cats = classifier.classify(
            "$250,000 of the general fund is provided solely for a pilot program awarding grants to counties.",
        );
        assert!(cats.contains(&"Pilots".to_string()));
        assert!(cats.contains(&"Grant programs".to_string()));
        assert!(cats.contains(&"Conditional appropriations".to_string()));
    }

    #[test]
    fn test_it_pattern_is_case_sensitive() {
        let classifier = ProvisoClassifier::new();
        assert!(!classifier.classify("it may adopt rules").contains(&"IT constraints".to_string()));
        assert!(classifier.classify("IT projects over budget").contains(&"IT constraints".to_string()));
    }

    #[test]
    fn test_segmentation() {
        let paragraphs = vec![
            "Sec. 103. FOR THE JOINT LEGISLATIVE AUDIT AND REVIEW COMMITTEE",
            "The appropriations in this section are subject to the following conditions and limitations:",
            "(1) $125,000 of the general fund is provided solely for a study.",
            "(a) The committee shall examine caseloads.",
            "(2) The committee may adopt rules.",
        ];
        let segments = segment_provisos(&paragraphs);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0, Some(1));
        assert!(segments[0].1.ends_with("The committee shall examine caseloads."));
        assert_eq!(segments[1].0, Some(2));
    }

    #[test]
    fn test_trigger_tail_opens_unnumbered_proviso() {
        let paragraphs = vec![
            "The appropriation in this section is subject to the following conditions and limitations: $40,000 is provided solely for staff.",
        ];
        let segments = segment_provisos(&paragraphs);
        assert_eq!(segments, vec![(None, "$40,000 is provided solely for staff.".to_string())]);
        assert!(segment_provisos(&["(1) before any trigger"]).is_empty());
    }

    #[test]
    fn test_fte_and_dollars() {
        assert_eq!(fte_mentions("funding for 12.5 FTEs and FTE: 3"), vec![12.5, 3.0]);
        let refs = dollar_references("$1,500,000 for fiscal year 2024 and $2,000 more");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].amount, Some(Money::from_dollars(1_500_000)));
    }

    #[test]
    fn test_invalid_rule_is_load_error() {
        let rules = ProvisoRuleSet {
            rules: vec![CategoryRule {
                category: "Broken".to_string(),
                patterns: vec!["(unclosed".to_string()],
                description: None,
            }],
        };
        assert!(ProvisoClassifier::from_rules(&rules).is_err());
    }

    #[test]
    fn test_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "rules": [ {{ "category": "Tribal consultation", "patterns": ["tribes?"] }} ] }}"#
        )
        .unwrap();

        let classifier = ProvisoClassifier::from_file(file.path()).unwrap();
        assert_eq!(classifier.rule_count(), 1);
        assert_eq!(classifier.classify("consult with tribes"), vec!["Tribal consultation".to_string()]);
    }

    #[test]
    fn test_extract_section_provisos() {
        let mut tree = DocumentTree::new("Bill");
        let body = tree.append_element(tree.root(), "BillBody", &[]);
        let s = tree.append_element(body, "BillSection", &[]);
        let h = tree.append_element(s, "BillSectionHeader", &[]);
        let n = tree.append_element(h, "BillSectionNumber", &[]);
        let v = tree.append_element(n, "Value", &[]);
        tree.append_text(v, "205.");
        tree.append_element(s, "Appropriations", &[("agency", "300")]);
        for text in [
            "The appropriations in this section are subject to the following conditions and limitations:",
            "(1) The department shall submit a report to the legislature by December 1, 2025.",
        ] {
            let p = tree.append_element(s, "P", &[]);
            tree.append_text(p, text);
        }

        let schema = LegislativeSchema::new();
        let mut warnings = Warnings::new();
        let index = ContextIndex::build(&tree, &schema, &mut warnings).unwrap();
        let provisos = extract_section_provisos(
            &tree,
            &index.sections[0],
            &schema,
            &ProvisoClassifier::new(),
            &mut warnings,
        );

        assert_eq!(provisos.len(), 1);
        assert_eq!(provisos[0].section_number, "205");
        assert_eq!(provisos[0].agency_code.as_deref(), Some("300"));
        assert_eq!(provisos[0].number, Some(1));
        assert!(!provisos[0].provided_solely);
        assert!(warnings.is_empty());
    }
}
