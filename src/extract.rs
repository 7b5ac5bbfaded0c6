// 🏗️ Bill Extractor - One document in, one canonical record set out
//
// Pipeline:
// 1. Walk the tree once → ContextIndex
// 2. Appropriations, provisos, references, vetoes read the tree + index
// 3. Fold line items into the fiscal aggregate
// 4. Reconcile declared totals (report only)
//
// Pure and synchronous: no I/O, no shared state. Bills can be extracted
// on independent threads.

use crate::aggregate::FiscalAggregate;
use crate::appropriations::{AppropriationExtractor, AppropriationGroup};
use crate::entities::{Agency, AgencyRegistry};
use crate::error::{ExtractionError, ExtractionWarning, Warnings};
use crate::fiscal_period::Biennium;
use crate::money::Money;
use crate::provisos::{extract_section_provisos, Proviso, ProvisoClassifier, ProvisoRuleSet};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::references::{extract_references, structured_citation, AmendedStatute, StatutoryReference};
use crate::schema::{LegislativeSchema, NodeRole, SchemaAdapter, SchemaMapping};
use crate::tree::DocumentTree;
use crate::vetoes::{resolve_vetoes, VetoRecord};
use crate::walker::ContextIndex;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Everything an extraction run can be tuned with
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    pub schema: SchemaMapping,
    pub rules: ProvisoRuleSet,
    /// Overrides the biennium read from the bill heading
    pub biennium_hint: Option<Biennium>,
    /// Largest total drift still reported as balanced
    pub tolerance: Money,
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: SchemaMapping) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_rules(mut self, rules: ProvisoRuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_biennium_hint(mut self, biennium: Biennium) -> Self {
        self.biennium_hint = Some(biennium);
        self
    }

    pub fn with_tolerance(mut self, tolerance: Money) -> Self {
        self.tolerance = tolerance;
        self
    }
}

// ============================================================================
// OUTPUT RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BillKind {
    Budget,
    Mixed,
    Policy,
}

impl BillKind {
    /// Budget: many appropriation lines, or many agencies with some lines.
    /// Mixed: any line, or a body full of dollar amounts. Policy otherwise.
    pub fn classify(line_count: usize, agency_count: usize, dollar_literals: usize) -> Self {
        if line_count > 50 || (agency_count > 20 && line_count > 10) {
            BillKind::Budget
        } else if line_count > 0 || dollar_literals > 10 {
            BillKind::Mixed
        } else {
            BillKind::Policy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillKind::Budget => "budget",
            BillKind::Mixed => "mixed",
            BillKind::Policy => "policy",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterLaw {
    pub year: Option<i32>,
    pub number: Option<String>,
}

/// Heading fields of the bill (single-field lookups)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillMetadata {
    pub short_bill_id: Option<String>,
    pub long_bill_id: Option<String>,
    pub legislature: Option<String>,
    pub session: Option<String>,
    pub brief_description: Option<String>,
    pub title: Option<String>,
    pub chapter_law: Option<ChapterLaw>,
    /// Biennium used as the fiscal-period hint
    pub biennium: Option<Biennium>,
    pub kind: BillKind,
    /// SHA-256 of the source text, when loaded from XML
    pub fingerprint: Option<String>,
    pub schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub ordinal: usize,
    pub label: Option<String>,
    pub title: Option<String>,
    pub section_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub number: Option<String>,
    pub part_ordinal: Option<usize>,
    pub section_type: Option<String>,
    pub action: Option<String>,
    pub caption: Option<String>,
    pub agency_code: Option<String>,
    pub agency_name: Option<String>,
    /// First structured statutory citation of the section
    pub citation: Option<String>,
    pub veto: Option<String>,
    /// Indices into `ExtractionOutput::appropriations`
    pub appropriation_groups: Vec<usize>,
    /// Indices into `ExtractionOutput::provisos`
    pub provisos: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendmentStats {
    pub strike_runs: usize,
    pub add_runs: usize,
    pub amended_items: usize,
    pub has_amendments: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: String,
    pub extracted_at: DateTime<Utc>,
    pub engine_version: String,
}

impl RunInfo {
    fn now() -> Self {
        RunInfo {
            run_id: uuid::Uuid::new_v4().to_string(),
            extracted_at: Utc::now(),
            engine_version: crate::VERSION.to_string(),
        }
    }
}

/// Canonical record set of one bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    pub bill: BillMetadata,
    pub parts: Vec<Part>,
    pub sections: Vec<Section>,
    pub agencies: Vec<Agency>,
    pub appropriations: Vec<AppropriationGroup>,
    pub provisos: Vec<Proviso>,
    pub statutory_references: Vec<StatutoryReference>,
    pub amended_statutes: Vec<AmendedStatute>,
    pub vetoes: Vec<VetoRecord>,
    pub fiscal: FiscalAggregate,
    pub reconciliation: ReconciliationReport,
    pub amendment_stats: AmendmentStats,
    #[serde(rename = "extractionWarnings")]
    pub warnings: Vec<ExtractionWarning>,
    pub run: RunInfo,
}

impl ExtractionOutput {
    /// Identity of the extracted document.
    ///
    /// The source fingerprint when the tree came from text; otherwise a
    /// hash of the extracted content, so re-extracting the same tree gives
    /// the same value.
    pub fn fingerprint(&self) -> String {
        if let Some(fp) = &self.bill.fingerprint {
            return fp.clone();
        }
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.bill.short_bill_id).unwrap_or_default());
        hasher.update(serde_json::to_vec(&self.sections).unwrap_or_default());
        hasher.update(serde_json::to_vec(&self.appropriations).unwrap_or_default());
        hasher.update(serde_json::to_vec(&self.provisos).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    pub fn line_item_count(&self) -> usize {
        self.appropriations.iter().map(|g| g.line_items().count()).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({}): {} sections, {} agencies, {} appropriation lines, {} provisos, {} references, {} vetoes, {} warnings",
            self.bill.short_bill_id.as_deref().unwrap_or("bill"),
            self.bill.kind.as_str(),
            self.sections.len(),
            self.agencies.len(),
            self.line_item_count(),
            self.provisos.len(),
            self.statutory_references.len(),
            self.vetoes.len(),
            self.warnings.len()
        )
    }
}

// ============================================================================
// BILL EXTRACTOR
// ============================================================================

pub struct BillExtractor {
    schema: Box<dyn SchemaAdapter>,
    classifier: ProvisoClassifier,
    biennium_hint: Option<Biennium>,
    reconciliation: ReconciliationEngine,
}

impl BillExtractor {
    /// Extractor for WA 2012 documents with the built-in proviso rules
    pub fn new() -> Self {
        BillExtractor {
            schema: Box::new(LegislativeSchema::new()),
            classifier: ProvisoClassifier::new(),
            biennium_hint: None,
            reconciliation: ReconciliationEngine::new(),
        }
    }

    /// Compile a configuration; fails on an invalid proviso pattern
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Ok(BillExtractor {
            schema: Box::new(LegislativeSchema::from_mapping(config.schema.clone())),
            classifier: ProvisoClassifier::from_rules(&config.rules)?,
            biennium_hint: config.biennium_hint,
            reconciliation: ReconciliationEngine::with_tolerance(config.tolerance),
        })
    }

    /// Swap in another schema version
    pub fn with_schema_adapter(mut self, schema: Box<dyn SchemaAdapter>) -> Self {
        self.schema = schema;
        self
    }

    /// Extract one bill.
    ///
    /// Fails only when the document has no bill body; every other problem
    /// becomes an entry in `extractionWarnings`.
    pub fn extract(&self, tree: &DocumentTree) -> Result<ExtractionOutput, ExtractionError> {
        let schema: &dyn SchemaAdapter = self.schema.as_ref();
        let mapping = schema.mapping();
        let mut warnings = Warnings::new();

        // 1. Walk
        let index = ContextIndex::build(tree, schema, &mut warnings)?;

        // 2. Heading metadata and biennium hint
        let text = |role| index.metadata_text(tree, role);
        let brief_description = text(NodeRole::BriefDescription);
        let title = text(NodeRole::BillTitle);
        let biennium = self.biennium_hint.or_else(|| {
            brief_description
                .as_deref()
                .and_then(Biennium::parse_loose)
                .or_else(|| title.as_deref().and_then(Biennium::parse_loose))
        });
        let chapter_law = index.metadata.get(&NodeRole::ChapterLaw).map(|&id| ChapterLaw {
            year: tree
                .attribute(id, &mapping.attr_chapter_year)
                .and_then(|y| y.trim().parse().ok()),
            number: Some(crate::tree::collapse_whitespace(&tree.text_content(id)))
                .filter(|n| !n.is_empty()),
        });

        // 3. Sections, appropriations, provisos, agencies
        let extractor = AppropriationExtractor::new(tree, &index, schema);
        let mut registry = AgencyRegistry::new();
        let mut appropriations = Vec::new();
        let mut provisos = Vec::new();
        let mut sections = Vec::with_capacity(index.sections.len());

        for frame in &index.sections {
            let number = frame.number.as_deref();
            let department = frame.department.as_ref();
            if let Some(code) = frame.agency_code() {
                registry.link(
                    code,
                    frame.agency_name(),
                    department.and_then(|d| d.index.as_deref()),
                    number,
                );
            }

            let mut group_ids = Vec::new();
            for &group in &frame.appropriation_groups {
                let Some(extracted) = extractor.extract_group(group, &mut warnings) else {
                    continue;
                };
                if let Some(code) = extracted.agency_code.as_deref() {
                    if Some(code) != frame.agency_code() {
                        registry.link(code, None, None, number);
                    }
                }
                group_ids.push(appropriations.len());
                appropriations.push(extracted);
            }

            let section_provisos =
                extract_section_provisos(tree, frame, schema, &self.classifier, &mut warnings);
            let proviso_ids: Vec<usize> = (provisos.len()..provisos.len() + section_provisos.len()).collect();
            provisos.extend(section_provisos);

            sections.push(Section {
                number: frame.number.clone(),
                part_ordinal: frame.part.and_then(|p| index.parts.get(p)).map(|p| p.ordinal),
                section_type: frame.section_type.clone(),
                action: frame.action.clone(),
                caption: frame.caption.clone(),
                agency_code: frame.agency_code().map(str::to_string),
                agency_name: frame.agency_name().map(str::to_string),
                citation: frame
                    .section_cites
                    .first()
                    .and_then(|&c| structured_citation(tree, c, schema)),
                veto: frame.veto.clone(),
                appropriation_groups: group_ids,
                provisos: proviso_ids,
            });

            tracing::debug!(section = number.unwrap_or("?"), "section extracted");
        }

        // Groups outside any section are reported by the extractor
        for &group in &index.orphan_groups {
            extractor.extract_group(group, &mut warnings);
        }

        let parts = index
            .parts
            .iter()
            .map(|p| Part {
                ordinal: p.ordinal,
                label: p.label.clone(),
                title: p.title.clone(),
                section_numbers: p
                    .sections
                    .iter()
                    .filter_map(|&s| index.sections.get(s).and_then(|f| f.number.clone()))
                    .collect(),
            })
            .collect();

        // 4. References and vetoes
        let (statutory_references, amended_statutes) = extract_references(tree, &index, schema);
        let vetoes = resolve_vetoes(tree, &index, schema, &mut warnings);

        // 5. Aggregate and reconcile
        let fiscal = FiscalAggregate::from_groups(&appropriations);
        let reconciliation = self.reconciliation.reconcile(&appropriations);

        let line_count = appropriations.iter().map(|g| g.line_items().count()).sum();
        let amended_items = appropriations
            .iter()
            .flat_map(|g| g.items.iter())
            .filter(|i| i.amount.is_amended)
            .count();
        let amendment_stats = AmendmentStats {
            strike_runs: index.strike_runs,
            add_runs: index.add_runs,
            amended_items,
            has_amendments: index.strike_runs + index.add_runs > 0,
        };

        let bill = BillMetadata {
            short_bill_id: text(NodeRole::ShortBillId),
            long_bill_id: text(NodeRole::LongBillId),
            legislature: text(NodeRole::Legislature),
            session: text(NodeRole::Session),
            brief_description,
            title,
            chapter_law,
            biennium,
            kind: BillKind::classify(line_count, registry.count(), index.dollar_literals),
            fingerprint: tree.source_fingerprint().map(str::to_string),
            schema_version: schema.version().to_string(),
        };

        let output = ExtractionOutput {
            bill,
            parts,
            sections,
            agencies: registry.into_vec(),
            appropriations,
            provisos,
            statutory_references,
            amended_statutes,
            vetoes,
            fiscal,
            reconciliation,
            amendment_stats,
            warnings: warnings.into_vec(),
            run: RunInfo::now(),
        };

        tracing::info!(
            bill = output.bill.short_bill_id.as_deref().unwrap_or("?"),
            kind = output.bill.kind.as_str(),
            sections = output.sections.len(),
            lines = line_count,
            grand_total = %output.fiscal.grand_total.new,
            warnings = output.warnings.len(),
            "bill extracted"
        );
        Ok(output)
    }
}

impl Default for BillExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BILL: &str = r#"<Bill>
  <BillHeading>
    <ShortBillId>HB 1140</ShortBillId>
    <BriefDescription>Making 2023-2025 fiscal biennium operating appropriations.</BriefDescription>
  </BillHeading>
  <BillBody>
    <Part>
      <P>PART I</P>
      <P>GENERAL GOVERNMENT</P>
      <BillSection type="new">
        <BillSectionHeader>
          <BillSectionNumber><Value>101</Value></BillSectionNumber>
          <Department><Index>HOUSE OF REPRESENTATIVES</Index><DeptName>FOR THE HOUSE OF REPRESENTATIVES</DeptName></Department>
        </BillSectionHeader>
        <Appropriations agency="011" appropType="appropriation">
          <Appropriation><AccountName>General Fund-State Appropriation (FY 2024)</AccountName><DollarAmount>$50,000,000</DollarAmount></Appropriation>
          <Appropriation><AccountName>General Fund-State Appropriation (FY 2025)</AccountName><DollarAmount>$52,000,000</DollarAmount></Appropriation>
          <AppropriationTotal><DollarAmount>$102,000,000</DollarAmount></AppropriationTotal>
        </Appropriations>
        <P>The appropriations in this section are subject to the following conditions and limitations:</P>
        <P>(1) $250,000 of the general fund-state appropriation is provided solely for a report to the legislature.</P>
      </BillSection>
    </Part>
  </BillBody>
</Bill>"#;

    #[test]
    fn test_extract_small_bill() {
        let tree = DocumentTree::from_xml(BILL).unwrap();
        let out = BillExtractor::new().extract(&tree).unwrap();

        assert_eq!(out.bill.short_bill_id.as_deref(), Some("HB 1140"));
        assert_eq!(out.bill.biennium, Some(Biennium::new(2023, 2025)));
        assert_eq!(out.bill.kind, BillKind::Mixed);
        assert!(out.bill.fingerprint.is_some());

        assert_eq!(out.parts.len(), 1);
        assert_eq!(out.parts[0].label.as_deref(), Some("PART I"));
        assert_eq!(out.parts[0].section_numbers, vec!["101".to_string()]);

        assert_eq!(out.sections[0].agency_code.as_deref(), Some("011"));
        assert_eq!(out.sections[0].agency_name.as_deref(), Some("HOUSE OF REPRESENTATIVES"));
        assert_eq!(out.agencies.len(), 1);

        assert_eq!(out.fiscal.grand_total.new, Money::from_dollars(102_000_000));
        assert_eq!(out.reconciliation.balanced, 1);
        assert_eq!(out.provisos.len(), 1);
        assert!(out.provisos[0].provided_solely);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        println!("✅ {}", out.summary());
    }

    #[test]
    fn test_missing_body_is_fatal() {
        let tree = DocumentTree::from_xml("<Bill><BillHeading/></Bill>").unwrap();
        let err = BillExtractor::new().extract(&tree).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingBillBody(_)));
    }

    #[test]
    fn test_config_hint_overrides_heading() {
        let config = ExtractorConfig::new().with_biennium_hint(Biennium::new(2021, 2023));
        let tree = DocumentTree::from_xml(BILL).unwrap();
        let out = BillExtractor::from_config(&config).unwrap().extract(&tree).unwrap();
        assert_eq!(out.bill.biennium, Some(Biennium::new(2021, 2023)));
        // Line periods come from the labels alone
        assert_eq!(out.appropriations[0].items[0].biennium, Some(Biennium::new(2023, 2025)));
        assert_eq!(out.appropriations[0].items[1].biennium, Some(Biennium::new(2025, 2027)));
    }

    #[test]
    fn test_department_sections_share_one_agency() {
        let xml = r#"<Bill>
  <BillBody>
    <BillSection type="new">
      <BillSectionHeader>
        <BillSectionNumber><Value>101</Value></BillSectionNumber>
        <Department><Index>SENATE</Index><DeptName>FOR THE SENATE</DeptName></Department>
      </BillSectionHeader>
      <Appropriations agency="046">
        <Appropriation><AccountName>General Fund-State Appropriation (FY 2024)</AccountName><DollarAmount>$5,000,000</DollarAmount></Appropriation>
      </Appropriations>
    </BillSection>
    <BillSection type="new">
      <BillSectionHeader>
        <BillSectionNumber><Value>102</Value></BillSectionNumber>
        <Department><Index>SENATE</Index><DeptName>FOR THE SENATE</DeptName></Department>
      </BillSectionHeader>
      <P>The appropriations in section 101 of this act are subject to the following conditions and limitations:</P>
      <P>(1) The senate shall report to the legislature by December 1, 2023.</P>
    </BillSection>
  </BillBody>
</Bill>"#;
        let tree = DocumentTree::from_xml(xml).unwrap();
        let out = BillExtractor::new().extract(&tree).unwrap();

        let codes: Vec<_> = out.agencies.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["046"]);
        assert_eq!(out.agencies[0].section_numbers, vec!["101", "102"]);
        assert_eq!(out.sections[1].agency_code.as_deref(), Some("046"));
        assert_eq!(out.provisos.len(), 1);
        assert_eq!(out.provisos[0].agency_code.as_deref(), Some("046"));
        println!("✅ proviso-only section joins agency 046");
    }

    #[test]
    fn test_bill_kind_thresholds() {
        assert_eq!(BillKind::classify(51, 1, 0), BillKind::Budget);
        assert_eq!(BillKind::classify(11, 21, 0), BillKind::Budget);
        assert_eq!(BillKind::classify(3, 1, 0), BillKind::Mixed);
        assert_eq!(BillKind::classify(0, 0, 11), BillKind::Mixed);
        assert_eq!(BillKind::classify(0, 0, 10), BillKind::Policy);
    }
}
