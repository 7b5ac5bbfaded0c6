// 📤 CSV Export - Appropriation lines and fiscal summaries
//
// Amounts are written in dollars with two decimals; an absent amount is an
// empty cell, never 0.00.

use crate::aggregate::{FiscalAggregate, Totals};
use crate::extract::ExtractionOutput;
use crate::money::Money;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    pub bill: String,
    pub section: String,
    pub agency: String,
    pub project: String,
    pub appropriation_kind: String,
    pub account_label: String,
    pub account_name: String,
    pub account_code: String,
    pub fund_type: String,
    pub fiscal_year: String,
    pub biennium: String,
    pub old_amount: String,
    pub new_amount: String,
    pub change_amount: String,
    pub is_amended: bool,
    pub is_total_row: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub agency: String,
    pub biennium: String,
    pub old_amount: String,
    pub new_amount: String,
    pub change_amount: String,
    pub line_count: usize,
    pub incomplete: usize,
}

/// `1234567` cents → `12345.67`
pub fn decimal_dollars(amount: Money) -> String {
    let cents = amount.cents();
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn cell(amount: Option<Money>) -> String {
    amount.map(decimal_dollars).unwrap_or_default()
}

/// One row per appropriation item, total rows included and flagged
pub fn item_rows(output: &ExtractionOutput) -> Vec<ItemRow> {
    let bill = output.bill.short_bill_id.clone().unwrap_or_default();
    output
        .appropriations
        .iter()
        .flat_map(|group| {
            let bill = bill.clone();
            group.items.iter().map(move |item| ItemRow {
                bill: bill.clone(),
                section: item.section_number.clone().unwrap_or_default(),
                agency: item.agency_code.clone().unwrap_or_default(),
                project: group.project_code.clone().unwrap_or_default(),
                appropriation_kind: group.kind.as_str().to_string(),
                account_label: item.account_label.clone(),
                account_name: item.account_name.clone(),
                account_code: item.account_code.clone().unwrap_or_default(),
                fund_type: item.fund_type.map(|f| f.as_str().to_string()).unwrap_or_default(),
                fiscal_year: item.fiscal_year.map(|fy| fy.to_string()).unwrap_or_default(),
                biennium: item.biennium.map(|b| b.to_string()).unwrap_or_default(),
                old_amount: cell(item.amount.old_amount),
                new_amount: cell(item.amount.new_amount),
                change_amount: cell(item.amount.change_amount),
                is_amended: item.amount.is_amended,
                is_total_row: item.is_total_row,
            })
        })
        .collect()
}

/// One row per (agency, biennium) bucket of an aggregate
pub fn summary_rows(aggregate: &FiscalAggregate) -> Vec<SummaryRow> {
    fn row(agency: &str, biennium: &str, totals: &Totals) -> SummaryRow {
        SummaryRow {
            agency: agency.to_string(),
            biennium: biennium.to_string(),
            old_amount: decimal_dollars(totals.old),
            new_amount: decimal_dollars(totals.new),
            change_amount: decimal_dollars(totals.change),
            line_count: totals.line_count,
            incomplete: totals.incomplete,
        }
    }

    aggregate
        .by_agency_biennium
        .iter()
        .flat_map(|(agency, by_biennium)| {
            by_biennium
                .iter()
                .map(move |(biennium, totals)| row(agency, biennium, totals))
        })
        .collect()
}

pub fn write_rows<W: Write, R: Serialize>(writer: W, rows: &[R]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn export_items(path: &Path, outputs: &[ExtractionOutput]) -> Result<usize> {
    let rows: Vec<ItemRow> = outputs.iter().flat_map(item_rows).collect();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_rows(file, &rows)?;
    Ok(rows.len())
}

pub fn export_summary(path: &Path, aggregate: &FiscalAggregate) -> Result<usize> {
    let rows = summary_rows(aggregate);
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_rows(file, &rows)?;
    Ok(rows.len())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::BillExtractor;
    use crate::tree::DocumentTree;

    const BILL: &str = r#"<Bill>
  <ShortBillId>HB 1216</ShortBillId>
  <BillBody>
    <BillSection>
      <BillSectionHeader><BillSectionNumber><Value>201</Value></BillSectionNumber></BillSectionHeader>
      <Appropriations agency="300">
        <Appropriation><AccountName>General Fund-Federal Appropriation (FY 2024)</AccountName><DollarAmount>$12,345.67</DollarAmount></Appropriation>
        <Appropriation><AccountName>General Fund-State Appropriation (FY 2024)</AccountName><DollarAmount><TextRun amendingStyle="strike">$500</TextRun></DollarAmount></Appropriation>
      </Appropriations>
    </BillSection>
  </BillBody>
</Bill>"#;

    #[test]
    fn test_decimal_dollars() {
        assert_eq!(decimal_dollars(Money::from_cents(1_234_567)), "12345.67");
        assert_eq!(decimal_dollars(Money::from_cents(-5)), "-0.05");
        assert_eq!(decimal_dollars(Money::ZERO), "0.00");
    }

    #[test]
    fn test_item_csv_keeps_absent_amounts_empty() {
        let tree = DocumentTree::from_xml(BILL).unwrap();
        let output = BillExtractor::new().extract(&tree).unwrap();

        let rows = item_rows(&output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].new_amount, "12345.67");
        assert_eq!(rows[1].old_amount, "500.00");
        assert_eq!(rows[1].new_amount, "");
        assert_eq!(rows[1].change_amount, "");

        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("bill,section,agency,project,appropriation_kind"));
        assert!(text.contains("HB 1216,201,300,"));
        println!("✅ {} CSV rows", rows.len());
    }

    #[test]
    fn test_summary_export_to_file() {
        let tree = DocumentTree::from_xml(BILL).unwrap();
        let output = BillExtractor::new().extract(&tree).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let written = export_summary(&path, &output.fiscal).unwrap();
        assert_eq!(written, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("300,2023-2025,12845.67,12345.67,0.00,2,1"));
    }
}
