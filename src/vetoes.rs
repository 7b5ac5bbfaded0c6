// 🚫 Veto Resolver - Section and line vetoes
//
// A section-level veto attribute and line-vetoed text runs are recorded
// independently; a section may carry both. Reading a fully vetoed
// section's line vetoes as redundant is left to the report layer.

use crate::error::{ExtractionWarning, Warnings};
use crate::schema::SchemaAdapter;
use crate::tree::{collapse_whitespace, DocumentTree};
use crate::walker::{ContextIndex, SectionFrame};
use serde::{Deserialize, Serialize};

/// Recognized values of the section `veto` attribute
pub const SECTION_VETO_VALUES: [&str; 4] = ["section", "line", "partial", "full"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VetoScope {
    Section,
    Line,
}

impl VetoScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetoScope::Section => "section",
            VetoScope::Line => "line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VetoRecord {
    pub section_number: String,
    pub scope: VetoScope,
    /// Lowercased attribute value (`section`, `partial`, ...) for section
    /// scope, `line` for line scope
    pub veto_kind: String,
    pub note: Option<String>,
    /// Struck text of each line-vetoed run, document order
    pub struck_lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineVetoFlag {
    Vetoed,
    NotVetoed,
    Unknown,
}

fn line_veto_flag(value: &str) -> LineVetoFlag {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => LineVetoFlag::Vetoed,
        "no" | "false" | "0" | "" => LineVetoFlag::NotVetoed,
        _ => LineVetoFlag::Unknown,
    }
}

/// Veto records of one section
pub fn resolve_section_vetoes(
    tree: &DocumentTree,
    frame: &SectionFrame,
    schema: &dyn SchemaAdapter,
    warnings: &mut Warnings,
) -> Vec<VetoRecord> {
    let mapping = schema.mapping();
    let mut records = Vec::new();

    let note = {
        let notes: Vec<String> = frame
            .veto_notes
            .iter()
            .map(|&n| collapse_whitespace(&tree.text_content(n)))
            .filter(|t| !t.is_empty())
            .collect();
        if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        }
    };

    // Section scope
    let mut section_kind = None;
    if let Some(value) = frame.veto.as_deref() {
        let lowered = value.trim().to_ascii_lowercase();
        if SECTION_VETO_VALUES.contains(&lowered.as_str()) {
            section_kind = Some(lowered);
        } else {
            warnings.push(ExtractionWarning::UnknownVetoMarkup {
                section_number: frame.number.clone(),
                attribute: mapping.attr_veto.clone(),
                value: value.to_string(),
            });
        }
    }

    // Line scope
    let mut struck_lines = Vec::new();
    for &run in &frame.line_veto_runs {
        let value = tree.attribute(run, &mapping.attr_line_veto).unwrap_or("");
        match line_veto_flag(value) {
            LineVetoFlag::Vetoed => {
                let text = collapse_whitespace(&tree.text_content(run));
                if !text.is_empty() {
                    struck_lines.push(text);
                }
            }
            LineVetoFlag::NotVetoed => {}
            LineVetoFlag::Unknown => warnings.push(ExtractionWarning::UnknownVetoMarkup {
                section_number: frame.number.clone(),
                attribute: mapping.attr_line_veto.clone(),
                value: value.to_string(),
            }),
        }
    }

    if section_kind.is_none() && struck_lines.is_empty() {
        return records;
    }

    let Some(section_number) = frame.number.clone() else {
        warnings.push(ExtractionWarning::MissingSectionContext {
            section_number: None,
            detail: "veto markup in a section with no number".to_string(),
        });
        return records;
    };

    let has_section_record = section_kind.is_some();
    if let Some(veto_kind) = section_kind {
        records.push(VetoRecord {
            section_number: section_number.clone(),
            scope: VetoScope::Section,
            veto_kind,
            note: note.clone(),
            struck_lines: Vec::new(),
        });
    }
    if !struck_lines.is_empty() {
        records.push(VetoRecord {
            section_number,
            scope: VetoScope::Line,
            veto_kind: "line".to_string(),
            note: if has_section_record { None } else { note },
            struck_lines,
        });
    }

    records
}

/// Veto records of every section, document order
pub fn resolve_vetoes(
    tree: &DocumentTree,
    index: &ContextIndex,
    schema: &dyn SchemaAdapter,
    warnings: &mut Warnings,
) -> Vec<VetoRecord> {
    index
        .sections
        .iter()
        .flat_map(|frame| resolve_section_vetoes(tree, frame, schema, warnings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LegislativeSchema;
    use crate::tree::NodeId;

    fn vetoed_section(tree: &mut DocumentTree, veto: &str, number: &str) -> NodeId {
        let body = tree
            .child_by_tag(tree.root(), "BillBody")
            .unwrap_or_else(|| tree.append_element(tree.root(), "BillBody", &[]));
        let s = tree.append_element(body, "BillSection", &[("veto", veto)]);
        let h = tree.append_element(s, "BillSectionHeader", &[]);
        let n = tree.append_element(h, "BillSectionNumber", &[]);
        let v = tree.append_element(n, "Value", &[]);
        tree.append_text(v, number);
        s
    }

    fn resolve(tree: &DocumentTree) -> (Vec<VetoRecord>, Warnings) {
        let schema = LegislativeSchema::new();
        let mut warnings = Warnings::new();
        let index = ContextIndex::build(tree, &schema, &mut warnings).unwrap();
        let records = resolve_vetoes(tree, &index, &schema, &mut warnings);
        (records, warnings)
    }

    #[test]
    fn test_section_and_line_veto_both_kept() {
        let mut tree = DocumentTree::new("Bill");
        let s = vetoed_section(&mut tree, "section", "127");
        let p = tree.append_element(s, "P", &[]);
        let run = tree.append_element(p, "TextRun", &[("lineVeto", "yes")]);
        tree.append_text(run, "(4) $50,000 is provided solely for a task force.");
        let note = tree.append_element(s, "VetoNote", &[]);
        tree.append_text(note, "VETO MESSAGE ON SECTION 127");

        let (records, warnings) = resolve(&tree);
        assert!(warnings.is_empty());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].scope, VetoScope::Section);
        assert_eq!(records[0].section_number, "127");
        assert_eq!(records[0].note.as_deref(), Some("VETO MESSAGE ON SECTION 127"));

        assert_eq!(records[1].scope, VetoScope::Line);
        assert_eq!(records[1].struck_lines, vec!["(4) $50,000 is provided solely for a task force.".to_string()]);
        println!("✅ Section 127: section veto + {} struck line(s)", records[1].struck_lines.len());
    }

    #[test]
    fn test_unknown_veto_value_warns_without_record() {
        let mut tree = DocumentTree::new("Bill");
        vetoed_section(&mut tree, "maybe", "9");

        let (records, warnings) = resolve(&tree);
        assert!(records.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.iter().next().map(|w| w.kind()), Some("unknownVetoMarkup"));
    }

    #[test]
    fn test_partial_veto_is_case_insensitive() {
        let mut tree = DocumentTree::new("Bill");
        vetoed_section(&mut tree, "Partial", "12");

        let (records, _) = resolve(&tree);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].veto_kind, "partial");
    }

    #[test]
    fn test_line_veto_no_is_ignored() {
        let mut tree = DocumentTree::new("Bill");
        let body = tree.append_element(tree.root(), "BillBody", &[]);
        let s = tree.append_element(body, "BillSection", &[]);
        let h = tree.append_element(s, "BillSectionHeader", &[]);
        let n = tree.append_element(h, "BillSectionNumber", &[]);
        let v = tree.append_element(n, "Value", &[]);
        tree.append_text(v, "4");
        let run = tree.append_element(s, "TextRun", &[("lineVeto", "no")]);
        tree.append_text(run, "kept text");

        let (records, warnings) = resolve(&tree);
        assert!(records.is_empty());
        assert!(warnings.is_empty());
    }
}
