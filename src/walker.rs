// 🚶 Document Walker - One top-down pass, one context per node
//
// Every node gets its enclosing part and section assigned exactly once,
// from an accumulator carried down the traversal. Later lookups are a
// vector index, never a climb back up through parents.

use crate::error::{ExtractionError, ExtractionWarning, Warnings};
use crate::money::find_money_literals;
use crate::amendment::{style_of, AmendingStyle};
use crate::schema::{NodeRole, SchemaAdapter};
use crate::tree::{collapse_whitespace, DocumentTree, NodeId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static PART_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*PART\s+([IVXLC]+|\d+)\b")
        .unwrap_or_else(|e| panic!("invalid part label pattern: {e}"))
});

// ============================================================================
// FRAMES
// ============================================================================

/// Part discovered during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFrame {
    pub node: NodeId,
    /// 1-based position among the bill's parts
    pub ordinal: usize,
    pub label: Option<String>,
    pub title: Option<String>,
    /// Indices into `ContextIndex::sections`, document order
    pub sections: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRef {
    pub name: Option<String>,
    pub index: Option<String>,
}

/// BillSection discovered during the walk, with the nodes each extractor
/// needs already bucketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFrame {
    pub node: NodeId,
    pub part: Option<usize>,
    pub number: Option<String>,
    pub section_type: Option<String>,
    pub action: Option<String>,
    pub veto: Option<String>,
    pub caption: Option<String>,
    pub department: Option<DepartmentRef>,
    /// `agency` attribute of the first Appropriations group
    pub appropriation_agency: Option<String>,
    /// Code another section of the same department carries
    pub department_code: Option<String>,
    pub appropriation_groups: Vec<NodeId>,
    pub paragraphs: Vec<NodeId>,
    pub section_cites: Vec<NodeId>,
    pub history: Vec<NodeId>,
    pub veto_notes: Vec<NodeId>,
    pub line_veto_runs: Vec<NodeId>,
}

impl SectionFrame {
    fn new(node: NodeId, part: Option<usize>) -> Self {
        SectionFrame {
            node,
            part,
            number: None,
            section_type: None,
            action: None,
            veto: None,
            caption: None,
            department: None,
            appropriation_agency: None,
            department_code: None,
            appropriation_groups: Vec::new(),
            paragraphs: Vec::new(),
            section_cites: Vec::new(),
            history: Vec::new(),
            veto_notes: Vec::new(),
            line_veto_runs: Vec::new(),
        }
    }

    /// Agency code: the appropriation attribute, else the code seen for the
    /// same department elsewhere in the bill, else the department index
    pub fn agency_code(&self) -> Option<&str> {
        self.appropriation_agency
            .as_deref()
            .or(self.department_code.as_deref())
            .or_else(|| self.department_index())
    }

    pub fn agency_name(&self) -> Option<&str> {
        self.department.as_ref().and_then(|d| d.name.as_deref())
    }

    fn department_index(&self) -> Option<&str> {
        self.department.as_ref().and_then(|d| d.index.as_deref())
    }
}

/// Nearest enclosing context of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContext {
    pub section_number: Option<String>,
    /// `None` means ungrouped (preamble or non-departmental section)
    pub agency_code: Option<String>,
    pub agency_name: Option<String>,
    pub part_ordinal: Option<usize>,
}

// ============================================================================
// CONTEXT INDEX
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct Carried {
    part: Option<usize>,
    section: Option<usize>,
    in_body: bool,
    in_header: bool,
    in_appropriations: bool,
    in_paragraph: bool,
}

/// Result of the single walk over one document
#[derive(Debug, Clone)]
pub struct ContextIndex {
    carried: Vec<(Option<usize>, Option<usize>)>,
    pub bill_body: NodeId,
    pub parts: Vec<PartFrame>,
    pub sections: Vec<SectionFrame>,
    /// Appropriations groups with no enclosing BillSection
    pub orphan_groups: Vec<NodeId>,
    /// First node of each heading metadata role
    pub metadata: HashMap<NodeRole, NodeId>,
    pub strike_runs: usize,
    pub add_runs: usize,
    pub dollar_literals: usize,
}

impl ContextIndex {
    /// Walk the tree once.
    ///
    /// Fails only when the document has no bill body.
    pub fn build(
        tree: &DocumentTree,
        schema: &dyn SchemaAdapter,
        warnings: &mut Warnings,
    ) -> Result<Self, ExtractionError> {
        let mapping = schema.mapping();
        let mut index = ContextIndex {
            carried: vec![(None, None); tree.len()],
            bill_body: tree.root(),
            parts: Vec::new(),
            sections: Vec::new(),
            orphan_groups: Vec::new(),
            metadata: HashMap::new(),
            strike_runs: 0,
            add_runs: 0,
            dollar_literals: 0,
        };
        let mut body: Option<NodeId> = None;

        let mut stack = vec![(tree.root(), Carried::default())];
        while let Some((id, mut ctx)) = stack.pop() {
            index.carried[id.index()] = (ctx.part, ctx.section);

            let Some(tag) = tree.tag(id) else {
                if ctx.in_body {
                    if let Some(text) = tree.text(id) {
                        index.dollar_literals += find_money_literals(text).len();
                    }
                }
                continue;
            };

            match schema.role_of(tag) {
                NodeRole::BillBody => {
                    body.get_or_insert(id);
                    ctx.in_body = true;
                }
                NodeRole::Part => {
                    let ordinal = index.parts.len() + 1;
                    index.parts.push(PartFrame {
                        node: id,
                        ordinal,
                        label: None,
                        title: None,
                        sections: Vec::new(),
                    });
                    ctx.part = Some(ordinal - 1);
                    ctx.section = None;
                    index.carried[id.index()] = (ctx.part, None);
                }
                NodeRole::PartNumber | NodeRole::PartTitle => {
                    if let Some(part) = ctx.part.and_then(|p| index.parts.get_mut(p)) {
                        let text = Some(collapse_whitespace(&tree.text_content(id)));
                        if schema.role_of(tag) == NodeRole::PartNumber {
                            part.label = part.label.take().or(text);
                        } else {
                            part.title = part.title.take().or(text);
                        }
                    }
                }
                NodeRole::BillSection => {
                    let mut frame = SectionFrame::new(id, ctx.part);
                    frame.section_type = tree.attribute(id, &mapping.attr_section_type).map(str::to_string);
                    frame.action = tree.attribute(id, &mapping.attr_section_action).map(str::to_string);
                    frame.veto = tree.attribute(id, &mapping.attr_veto).map(str::to_string);

                    let section_idx = index.sections.len();
                    index.sections.push(frame);
                    if let Some(part) = ctx.part.and_then(|p| index.parts.get_mut(p)) {
                        part.sections.push(section_idx);
                    }
                    ctx.section = Some(section_idx);
                    ctx.in_header = false;
                    ctx.in_appropriations = false;
                    ctx.in_paragraph = false;
                    index.carried[id.index()] = (ctx.part, ctx.section);
                }
                NodeRole::SectionHeader => ctx.in_header = true,
                NodeRole::SectionNumberValue => {
                    let under_number = tree
                        .parent(id)
                        .and_then(|p| tree.tag(p))
                        .map_or(false, |t| t == mapping.section_number);
                    if let (true, Some(frame)) = (under_number, index.section_mut(ctx.section)) {
                        if frame.number.is_none() {
                            frame.number = clean_section_number(&tree.text_content(id));
                        }
                    }
                }
                NodeRole::SectionCaption if ctx.in_header => {
                    if let Some(frame) = index.section_mut(ctx.section) {
                        frame.caption = Some(collapse_whitespace(&tree.text_content(id)));
                    }
                }
                NodeRole::Department => {
                    if let Some(frame) = index.section_mut(ctx.section) {
                        if frame.department.is_none() {
                            frame.department = Some(read_department(tree, id, schema));
                        }
                    }
                    ctx.in_header = true;
                }
                NodeRole::Appropriations => {
                    match index.section_mut(ctx.section) {
                        Some(frame) => {
                            if frame.appropriation_agency.is_none() {
                                frame.appropriation_agency = tree
                                    .attribute(id, &mapping.attr_agency)
                                    .map(str::trim)
                                    .filter(|a| !a.is_empty())
                                    .map(str::to_string);
                            }
                            frame.appropriation_groups.push(id);
                        }
                        None => index.orphan_groups.push(id),
                    }
                    ctx.in_appropriations = true;
                }
                NodeRole::Paragraph => {
                    let skip = ctx.in_header || ctx.in_appropriations || ctx.in_paragraph;
                    match (skip, ctx.section) {
                        (false, Some(_)) => {
                            if let Some(frame) = index.section_mut(ctx.section) {
                                frame.paragraphs.push(id);
                            }
                        }
                        (false, None) => index.note_part_heading(tree, id, ctx.part),
                        _ => {}
                    }
                    ctx.in_paragraph = true;
                }
                NodeRole::SectionCite => {
                    if let Some(frame) = index.section_mut(ctx.section) {
                        frame.section_cites.push(id);
                    }
                }
                NodeRole::History => {
                    if let Some(frame) = index.section_mut(ctx.section) {
                        frame.history.push(id);
                    }
                }
                NodeRole::VetoNote => {
                    if let Some(frame) = index.section_mut(ctx.section) {
                        frame.veto_notes.push(id);
                    }
                }
                NodeRole::TextRun => {
                    match style_of(tree, id, mapping) {
                        Some(AmendingStyle::Strike) => index.strike_runs += 1,
                        Some(AmendingStyle::Add) => index.add_runs += 1,
                        None => {}
                    }
                    if tree.attribute(id, &mapping.attr_line_veto).is_some() {
                        if let Some(frame) = index.section_mut(ctx.section) {
                            frame.line_veto_runs.push(id);
                        }
                    }
                }
                role @ (NodeRole::ShortBillId
                | NodeRole::LongBillId
                | NodeRole::Legislature
                | NodeRole::Session
                | NodeRole::BriefDescription
                | NodeRole::BillTitle
                | NodeRole::ChapterLaw) => {
                    index.metadata.entry(role).or_insert(id);
                }
                _ => {}
            }

            stack.extend(tree.children(id).iter().rev().map(|&c| (c, ctx)));
        }

        index.bill_body = body.ok_or_else(|| ExtractionError::MissingBillBody(mapping.bill_body.clone()))?;
        index.link_department_codes();
        index.check_section_numbers(warnings);

        tracing::debug!(
            parts = index.parts.len(),
            sections = index.sections.len(),
            "document walk complete"
        );
        Ok(index)
    }

    fn section_mut(&mut self, section: Option<usize>) -> Option<&mut SectionFrame> {
        section.and_then(move |s| self.sections.get_mut(s))
    }

    /// Unwrapped `P` before a part's first section: `PART I` label or title
    fn note_part_heading(&mut self, tree: &DocumentTree, id: NodeId, part: Option<usize>) {
        let Some(frame) = part.and_then(|p| self.parts.get_mut(p)) else {
            return;
        };
        if tree.parent(id) != Some(frame.node) {
            return;
        }
        let text = collapse_whitespace(&tree.text_content(id));
        if text.is_empty() {
            return;
        }
        if frame.label.is_none() && PART_LABEL.is_match(&text) {
            frame.label = Some(text);
        } else if frame.title.is_none() {
            frame.title = Some(text);
        }
    }

    /// Give code-less sections the code their department carries elsewhere
    fn link_department_codes(&mut self) {
        let mut codes: HashMap<String, String> = HashMap::new();
        for frame in &self.sections {
            if let (Some(index), Some(code)) = (frame.department_index(), &frame.appropriation_agency) {
                codes.entry(index.to_uppercase()).or_insert_with(|| code.clone());
            }
        }
        if codes.is_empty() {
            return;
        }
        for frame in self.sections.iter_mut().filter(|f| f.appropriation_agency.is_none()) {
            frame.department_code = frame
                .department_index()
                .and_then(|index| codes.get(&index.to_uppercase()))
                .cloned();
        }
    }

    fn check_section_numbers(&self, warnings: &mut Warnings) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for frame in &self.sections {
            match frame.number.as_deref() {
                Some(number) => {
                    let count = seen.entry(number).or_insert(0);
                    *count += 1;
                    if *count == 2 {
                        warnings.push(ExtractionWarning::MissingSectionContext {
                            section_number: Some(number.to_string()),
                            detail: "duplicate section number".to_string(),
                        });
                    }
                }
                None => warnings.push(ExtractionWarning::MissingSectionContext {
                    section_number: None,
                    detail: "bill section has no section number".to_string(),
                }),
            }
        }
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// Index of the section enclosing `id` (the section node itself included)
    pub fn section_of(&self, id: NodeId) -> Option<usize> {
        self.carried.get(id.index()).and_then(|(_, s)| *s)
    }

    pub fn part_of(&self, id: NodeId) -> Option<usize> {
        self.carried.get(id.index()).and_then(|(p, _)| *p)
    }

    pub fn section_frame(&self, id: NodeId) -> Option<&SectionFrame> {
        self.section_of(id).and_then(|s| self.sections.get(s))
    }

    /// Enclosing `{section, agency, part}` of any node
    pub fn context(&self, id: NodeId) -> NodeContext {
        let frame = self.section_frame(id);
        NodeContext {
            section_number: frame.and_then(|f| f.number.clone()),
            agency_code: frame.and_then(|f| f.agency_code().map(str::to_string)),
            agency_name: frame.and_then(|f| f.agency_name().map(str::to_string)),
            part_ordinal: self
                .part_of(id)
                .and_then(|p| self.parts.get(p))
                .map(|p| p.ordinal),
        }
    }

    /// Collapsed text of the first node with a metadata role
    pub fn metadata_text(&self, tree: &DocumentTree, role: NodeRole) -> Option<String> {
        self.metadata
            .get(&role)
            .map(|&id| collapse_whitespace(&tree.text_content(id)))
            .filter(|t| !t.is_empty())
    }
}

fn read_department(tree: &DocumentTree, id: NodeId, schema: &dyn SchemaAdapter) -> DepartmentRef {
    let mapping = schema.mapping();
    let text_of = |tag: &str| {
        tree.child_by_tag(id, tag)
            .map(|n| collapse_whitespace(&tree.text_content(n)))
            .filter(|t| !t.is_empty())
    };
    DepartmentRef {
        name: text_of(&mapping.department_name).map(|n| clean_department_name(&n)),
        index: text_of(&mapping.department_index),
    }
}

/// `Sec. 101.` → `101`
pub fn clean_section_number(raw: &str) -> Option<String> {
    let mut s = collapse_whitespace(raw);
    for prefix in ["Sec.", "SEC.", "Section", "SECTION"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim().to_string();
            break;
        }
    }
    let s = s.trim_end_matches('.').trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Strip the leading `FOR THE ` from a department heading
pub fn clean_department_name(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.get(..8) {
        Some(head) if head.eq_ignore_ascii_case("FOR THE ") => trimmed[8..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
