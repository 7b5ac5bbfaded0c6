// 📐 Schema Layer - Declarative tag/attribute mapping
//
// One engine, many document schema versions. Instead of copying the whole
// walker per bill type or output format, the walker asks a SchemaAdapter
// what role a tag plays.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// NODE ROLES
// ============================================================================

/// Structural role a tag plays in a legislative bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    BillBody,
    Part,
    PartNumber,
    PartTitle,
    BillSection,
    SectionHeader,
    SectionNumber,
    SectionNumberValue,
    SectionCaption,
    Department,
    DepartmentIndex,
    DepartmentName,
    Appropriations,
    Appropriation,
    AccountName,
    DollarAmount,
    TextRun,
    AppropriationTotal,
    AppropriationSubTotal,
    SectionCite,
    CiteTitle,
    CiteChapter,
    CiteSection,
    VetoNote,
    Paragraph,
    History,
    // Bill heading metadata (single-field lookups)
    ShortBillId,
    LongBillId,
    Legislature,
    Session,
    BriefDescription,
    BillTitle,
    ChapterLaw,
    Other,
}

// ============================================================================
// SCHEMA MAPPING (configuration)
// ============================================================================

/// Tag and attribute names for one document schema version.
///
/// Defaults describe the Washington legislative document schema
/// (`http://leg.wa.gov/2012/document`). Any field may be overridden from
/// a JSON file; missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaMapping {
    pub version: String,

    // Structure
    pub bill_body: String,
    pub part: String,
    pub part_number: String,
    pub part_title: String,
    pub bill_section: String,
    pub section_header: String,
    pub section_number: String,
    pub section_number_value: String,
    pub section_caption: String,
    pub department: String,
    pub department_index: String,
    pub department_name: String,
    pub appropriations: String,
    pub appropriation: String,
    pub account_name: String,
    pub dollar_amount: String,
    pub text_run: String,
    pub appropriation_total: String,
    pub appropriation_subtotal: String,
    pub section_cite: String,
    pub cite_title: String,
    pub cite_chapter: String,
    pub cite_section: String,
    pub veto_notes: Vec<String>,
    pub paragraph: String,
    pub history: String,

    // Heading metadata
    pub short_bill_id: String,
    pub long_bill_id: String,
    pub legislature: String,
    pub session: String,
    pub brief_description: String,
    pub bill_title: String,
    pub chapter_law: String,

    // Attributes
    pub attr_section_type: String,
    pub attr_section_action: String,
    pub attr_veto: String,
    pub attr_agency: String,
    pub attr_project: String,
    pub attr_approp_type: String,
    pub attr_amending_style: String,
    pub attr_line_veto: String,
    pub attr_chapter_year: String,

    // Attribute values
    pub style_strike: String,
    pub style_add: String,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        SchemaMapping {
            version: "wa-2012".to_string(),
            bill_body: "BillBody".to_string(),
            part: "Part".to_string(),
            part_number: "PartNumber".to_string(),
            part_title: "PartTitle".to_string(),
            bill_section: "BillSection".to_string(),
            section_header: "BillSectionHeader".to_string(),
            section_number: "BillSectionNumber".to_string(),
            section_number_value: "Value".to_string(),
            section_caption: "Caption".to_string(),
            department: "Department".to_string(),
            department_index: "Index".to_string(),
            department_name: "DeptName".to_string(),
            appropriations: "Appropriations".to_string(),
            appropriation: "Appropriation".to_string(),
            account_name: "AccountName".to_string(),
            dollar_amount: "DollarAmount".to_string(),
            text_run: "TextRun".to_string(),
            appropriation_total: "AppropriationTotal".to_string(),
            appropriation_subtotal: "AppropriationSubTotal".to_string(),
            section_cite: "SectionCite".to_string(),
            cite_title: "TitleNumber".to_string(),
            cite_chapter: "ChapterNumber".to_string(),
            cite_section: "SectionNumber".to_string(),
            veto_notes: vec!["VetoNote".to_string(), "SeeVetoNote".to_string()],
            paragraph: "P".to_string(),
            history: "History".to_string(),
            short_bill_id: "ShortBillId".to_string(),
            long_bill_id: "LongBillId".to_string(),
            legislature: "Legislature".to_string(),
            session: "Session".to_string(),
            brief_description: "BriefDescription".to_string(),
            bill_title: "BillTitle".to_string(),
            chapter_law: "ChapterLaw".to_string(),
            attr_section_type: "type".to_string(),
            attr_section_action: "action".to_string(),
            attr_veto: "veto".to_string(),
            attr_agency: "agency".to_string(),
            attr_project: "project".to_string(),
            attr_approp_type: "appropType".to_string(),
            attr_amending_style: "amendingStyle".to_string(),
            attr_line_veto: "lineVeto".to_string(),
            attr_chapter_year: "year".to_string(),
            style_strike: "strike".to_string(),
            style_add: "add".to_string(),
        }
    }
}

impl SchemaMapping {
    /// Load a mapping from a JSON file (partial files are merged with defaults)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read schema mapping: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse schema mapping JSON")
    }

    fn role_table(&self) -> HashMap<String, NodeRole> {
        let mut table = HashMap::new();
        let pairs = [
            (&self.bill_body, NodeRole::BillBody),
            (&self.part, NodeRole::Part),
            (&self.part_number, NodeRole::PartNumber),
            (&self.part_title, NodeRole::PartTitle),
            (&self.bill_section, NodeRole::BillSection),
            (&self.section_header, NodeRole::SectionHeader),
            (&self.section_number, NodeRole::SectionNumber),
            (&self.section_number_value, NodeRole::SectionNumberValue),
            (&self.section_caption, NodeRole::SectionCaption),
            (&self.department, NodeRole::Department),
            (&self.department_index, NodeRole::DepartmentIndex),
            (&self.department_name, NodeRole::DepartmentName),
            (&self.appropriations, NodeRole::Appropriations),
            (&self.appropriation, NodeRole::Appropriation),
            (&self.account_name, NodeRole::AccountName),
            (&self.dollar_amount, NodeRole::DollarAmount),
            (&self.text_run, NodeRole::TextRun),
            (&self.appropriation_total, NodeRole::AppropriationTotal),
            (&self.appropriation_subtotal, NodeRole::AppropriationSubTotal),
            (&self.section_cite, NodeRole::SectionCite),
            (&self.cite_title, NodeRole::CiteTitle),
            (&self.cite_chapter, NodeRole::CiteChapter),
            (&self.cite_section, NodeRole::CiteSection),
            (&self.paragraph, NodeRole::Paragraph),
            (&self.history, NodeRole::History),
            (&self.short_bill_id, NodeRole::ShortBillId),
            (&self.long_bill_id, NodeRole::LongBillId),
            (&self.legislature, NodeRole::Legislature),
            (&self.session, NodeRole::Session),
            (&self.brief_description, NodeRole::BriefDescription),
            (&self.bill_title, NodeRole::BillTitle),
            (&self.chapter_law, NodeRole::ChapterLaw),
        ];
        for (tag, role) in pairs {
            table.entry(tag.clone()).or_insert(role);
        }
        for tag in &self.veto_notes {
            table.entry(tag.clone()).or_insert(NodeRole::VetoNote);
        }
        table
    }
}

// ============================================================================
// SCHEMA ADAPTER (capability trait)
// ============================================================================

/// SchemaAdapter - how the engine reads one document schema version
///
/// Adding a schema version means implementing (or configuring) this trait;
/// the walker and extractors never change.
pub trait SchemaAdapter: Send + Sync {
    /// Tag and attribute names
    fn mapping(&self) -> &SchemaMapping;

    /// Role of an element tag
    fn role_of(&self, tag: &str) -> NodeRole;

    /// Schema version label (for provenance)
    fn version(&self) -> &str {
        &self.mapping().version
    }
}

/// Mapping-driven adapter; the default instance reads WA 2012 documents.
#[derive(Debug, Clone)]
pub struct LegislativeSchema {
    mapping: SchemaMapping,
    roles: HashMap<String, NodeRole>,
}

impl LegislativeSchema {
    pub fn new() -> Self {
        Self::from_mapping(SchemaMapping::default())
    }

    pub fn from_mapping(mapping: SchemaMapping) -> Self {
        let roles = mapping.role_table();
        LegislativeSchema { mapping, roles }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_mapping(SchemaMapping::from_file(path)?))
    }
}

impl Default for LegislativeSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaAdapter for LegislativeSchema {
    fn mapping(&self) -> &SchemaMapping {
        &self.mapping
    }

    fn role_of(&self, tag: &str) -> NodeRole {
        self.roles.get(tag).copied().unwrap_or(NodeRole::Other)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_roles() {
        let schema = LegislativeSchema::new();

        assert_eq!(schema.role_of("BillSection"), NodeRole::BillSection);
        assert_eq!(schema.role_of("Appropriations"), NodeRole::Appropriations);
        assert_eq!(schema.role_of("AppropriationSubTotal"), NodeRole::AppropriationSubTotal);
        assert_eq!(schema.role_of("SeeVetoNote"), NodeRole::VetoNote);
        assert_eq!(schema.role_of("VetoNote"), NodeRole::VetoNote);
        assert_eq!(schema.role_of("Sponsors"), NodeRole::Other);
        assert_eq!(schema.version(), "wa-2012");
    }

    #[test]
    fn test_partial_mapping_merges_with_defaults() {
        let json = r#"{ "version": "capital-2019", "appropriations": "CapitalAppropriations" }"#;
        let mapping: SchemaMapping = serde_json::from_str(json).unwrap();
        let schema = LegislativeSchema::from_mapping(mapping);

        assert_eq!(schema.role_of("CapitalAppropriations"), NodeRole::Appropriations);
        assert_eq!(schema.role_of("Appropriations"), NodeRole::Other);
        assert_eq!(schema.role_of("BillSection"), NodeRole::BillSection);
        assert_eq!(schema.version(), "capital-2019");
    }

    #[test]
    fn test_mapping_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "paragraph": "Para", "attrVeto": "vetoType" }}"#).unwrap();

        let schema = LegislativeSchema::from_file(file.path()).unwrap();
        assert_eq!(schema.role_of("Para"), NodeRole::Paragraph);
        assert_eq!(schema.mapping().attr_veto, "vetoType");
    }

    #[test]
    fn test_mapping_from_missing_file_is_an_error() {
        let result = SchemaMapping::from_file("/nonexistent/schema.json");
        assert!(result.is_err());
    }
}
