// 📚 Statutory References - Citation extraction and per-bill dedup
//
// Citations come from structured SectionCite nodes, paragraph prose and
// History notes. Each is rewritten to one canonical form, then deduped
// case- and whitespace-insensitively.

use crate::amendment::current_text;
use crate::schema::SchemaAdapter;
use crate::tree::{collapse_whitespace, DocumentTree, NodeId};
use crate::walker::{ContextIndex, SectionFrame};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid citation pattern {re:?}: {e}"))
}

static RCW_SECTION: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?i)\bRCW\s+(\d+[A-Z]?)\s*\.\s*(\d+[A-Z]?)\s*\.\s*(\d+[A-Z]?)((?:\([0-9a-z]+\))*)")
});
static RCW_CHAPTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bchapter\s+(\d+[A-Z]?\.\d+[A-Z]?)\s+RCW\b"));
static RCW_TITLE: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\btitle\s+(\d+[A-Z]?)\s+RCW\b"));
static WAC_SECTION: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWAC\s+(\d+[A-Z]?)-(\d+[A-Z]?)-(\d+[A-Z]?)"));
static WAC_CHAPTER: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bchapter\s+(\d+[A-Z]?-\d+[A-Z]?)\s+WAC\b"));
static SESSION_LAW: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\b(\d{4})\s+c\s+(\d+)(?:\s+(?:s|§)\s*(\d+))?\b"));
static SESSION_LAW_LONG: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bchapter\s+(\d+),\s+Laws\s+of\s+(\d{4})"));
static USC: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?i)\b(\d+)\s+U\.?\s?S\.?\s?C\.?\s+(?:(?:Sec\.?|§+)\s*)?(\d+[a-z]?(?:-\d+)?)")
});
static CFR: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?i)\b(\d+)\s+C\.?\s?F\.?\s?R\.?\s+(?:(?:Part|Sec\.?|§+)\s*)?(\d+(?:\.\d+)?)")
});

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    #[serde(rename = "RCW")]
    Rcw,
    #[serde(rename = "WAC")]
    Wac,
    #[serde(rename = "session-law")]
    SessionLaw,
    #[serde(rename = "USC")]
    Usc,
    #[serde(rename = "CFR")]
    Cfr,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Rcw => "RCW",
            ReferenceKind::Wac => "WAC",
            ReferenceKind::SessionLaw => "session-law",
            ReferenceKind::Usc => "USC",
            ReferenceKind::Cfr => "CFR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatutoryReference {
    pub kind: ReferenceKind,
    /// Canonical citation (`RCW 43.88.030`, `2018 c 68 s 1`)
    pub citation: String,
    /// Bill sections citing it, first occurrence order
    pub section_numbers: Vec<String>,
}

/// Statute rewritten by an amendatory section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendedStatute {
    pub statute: String,
    pub section_number: Option<String>,
    pub action: String,
}

/// Dedup key: case- and whitespace-insensitive
pub fn reference_key(citation: &str) -> String {
    citation
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Per-bill citation set. Created for one extraction and consumed by it.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    seen: HashMap<String, usize>,
    references: Vec<StatutoryReference>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canonical citation; returns false when it was already known
    pub fn add(&mut self, kind: ReferenceKind, citation: &str, section: Option<&str>) -> bool {
        let key = reference_key(citation);
        let (idx, fresh) = match self.seen.get(&key) {
            Some(&idx) => (idx, false),
            None => {
                self.references.push(StatutoryReference {
                    kind,
                    citation: citation.to_string(),
                    section_numbers: Vec::new(),
                });
                self.seen.insert(key, self.references.len() - 1);
                (self.references.len() - 1, true)
            }
        };
        if let Some(section) = section {
            let sections = &mut self.references[idx].section_numbers;
            if !sections.iter().any(|s| s == section) {
                sections.push(section.to_string());
            }
        }
        fresh
    }

    /// Scan free text for every supported citation form
    pub fn scan_text(&mut self, text: &str, section: Option<&str>) {
        for (kind, citation) in find_citations(text) {
            self.add(kind, &citation, section);
        }
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn into_vec(self) -> Vec<StatutoryReference> {
        self.references
    }
}

/// Canonical citations in text, in pattern order then position
pub fn find_citations(text: &str) -> Vec<(ReferenceKind, String)> {
    let mut out = Vec::new();

    for caps in RCW_SECTION.captures_iter(text) {
        let subsections = caps.get(4).map_or("", |m| m.as_str()).to_lowercase();
        out.push((
            ReferenceKind::Rcw,
            format!("RCW {}.{}.{}{}", &caps[1].to_uppercase(), &caps[2].to_uppercase(), &caps[3].to_uppercase(), subsections),
        ));
    }
    for caps in RCW_CHAPTER.captures_iter(text) {
        out.push((ReferenceKind::Rcw, format!("chapter {} RCW", caps[1].to_uppercase())));
    }
    for caps in RCW_TITLE.captures_iter(text) {
        out.push((ReferenceKind::Rcw, format!("Title {} RCW", caps[1].to_uppercase())));
    }
    for caps in WAC_SECTION.captures_iter(text) {
        out.push((
            ReferenceKind::Wac,
            format!("WAC {}-{}-{}", caps[1].to_uppercase(), caps[2].to_uppercase(), caps[3].to_uppercase()),
        ));
    }
    for caps in WAC_CHAPTER.captures_iter(text) {
        out.push((ReferenceKind::Wac, format!("chapter {} WAC", caps[1].to_uppercase())));
    }
    for caps in SESSION_LAW.captures_iter(text) {
        let citation = match caps.get(3) {
            Some(s) => format!("{} c {} s {}", &caps[1], &caps[2], s.as_str()),
            None => format!("{} c {}", &caps[1], &caps[2]),
        };
        out.push((ReferenceKind::SessionLaw, citation));
    }
    for caps in SESSION_LAW_LONG.captures_iter(text) {
        out.push((ReferenceKind::SessionLaw, format!("{} c {}", &caps[2], &caps[1])));
    }
    for caps in USC.captures_iter(text) {
        out.push((ReferenceKind::Usc, format!("{} U.S.C. {}", &caps[1], &caps[2])));
    }
    for caps in CFR.captures_iter(text) {
        out.push((ReferenceKind::Cfr, format!("{} C.F.R. {}", &caps[1], &caps[2])));
    }

    out
}

/// Canonical citation of a structured SectionCite node
pub fn structured_citation(tree: &DocumentTree, cite: NodeId, schema: &dyn SchemaAdapter) -> Option<String> {
    let mapping = schema.mapping();
    let part = |tag: &str| {
        tree.find_descendant(cite, tag)
            .map(|n| collapse_whitespace(&tree.text_content(n)))
            .filter(|t| !t.is_empty())
    };

    match (part(&mapping.cite_title), part(&mapping.cite_chapter), part(&mapping.cite_section)) {
        (Some(t), Some(c), Some(s)) => Some(format!("RCW {}.{}.{}", t, c, s)),
        (Some(t), Some(c), None) => Some(format!("chapter {}.{} RCW", t, c)),
        (Some(t), None, None) => Some(format!("Title {} RCW", t)),
        _ => {
            // Unstructured cite: fall back to its text
            let text = collapse_whitespace(&tree.text_content(cite));
            find_citations(&text).into_iter().next().map(|(_, c)| c)
        }
    }
}

fn is_amendatory(frame: &SectionFrame) -> bool {
    let amendatory_type = frame
        .section_type
        .as_deref()
        .map_or(false, |t| t.eq_ignore_ascii_case("amendatory"));
    let amend_action = frame
        .action
        .as_deref()
        .map_or(false, |a| a.eq_ignore_ascii_case("amend"));
    amendatory_type || amend_action
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// All citations of a bill plus the statutes its amendatory sections
/// rewrite
pub fn extract_references(
    tree: &DocumentTree,
    index: &ContextIndex,
    schema: &dyn SchemaAdapter,
) -> (Vec<StatutoryReference>, Vec<AmendedStatute>) {
    let mapping = schema.mapping();
    let mut collector = ReferenceCollector::new();
    let mut amended = Vec::new();
    let mut amended_seen: HashSet<(String, Option<String>)> = HashSet::new();

    for frame in &index.sections {
        let section = frame.number.as_deref();

        for &cite in &frame.section_cites {
            let Some(citation) = structured_citation(tree, cite, schema) else {
                continue;
            };
            let kind = find_citations(&citation)
                .into_iter()
                .next()
                .map_or(ReferenceKind::Rcw, |(k, _)| k);
            collector.add(kind, &citation, section);

            if is_amendatory(frame)
                && amended_seen.insert((reference_key(&citation), frame.number.clone()))
            {
                amended.push(AmendedStatute {
                    statute: citation,
                    section_number: frame.number.clone(),
                    action: frame.action.clone().unwrap_or_else(|| "amend".to_string()),
                });
            }
        }

        for &p in &frame.paragraphs {
            collector.scan_text(&current_text(tree, p, mapping), section);
        }
        for &h in &frame.history {
            collector.scan_text(&tree.text_content(h), section);
        }
    }

    tracing::debug!(references = collector.len(), amended = amended.len(), "citations collected");
    (collector.into_vec(), amended)
}

// ============================================================================
// TESTS
// ============================================================================
