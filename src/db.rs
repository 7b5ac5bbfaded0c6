// 🗄️ Persistence - Extraction output → SQLite + WAL
//
// One bill per import, idempotent by document fingerprint: importing the
// same document twice inserts nothing the second time. Every import
// attempt lands in the extraction_log audit table.

use crate::extract::ExtractionOutput;
use crate::fiscal_period::Biennium;
use crate::money::Money;
use crate::timeline::Timeline;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};

/// Audit event (one per import attempt)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub fingerprint: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, fingerprint: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            fingerprint: fingerprint.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Inserted { bill_id: i64, items: usize },
    AlreadyImported,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Bills (one row per imported document)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT UNIQUE NOT NULL,
            short_bill_id TEXT,
            long_bill_id TEXT,
            legislature TEXT,
            session TEXT,
            brief_description TEXT,
            kind TEXT NOT NULL,
            biennium TEXT,
            chapter_year INTEGER,
            chapter_number TEXT,
            line_count INTEGER NOT NULL,
            grand_total_cents INTEGER NOT NULL,
            warning_count INTEGER NOT NULL,
            run_id TEXT NOT NULL,
            extracted_at TEXT NOT NULL,
            output TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS agencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id INTEGER NOT NULL REFERENCES bills(id),
            code TEXT NOT NULL,
            name TEXT,
            index_name TEXT,
            section_numbers TEXT NOT NULL,
            UNIQUE (bill_id, code)
        )",
        [],
    )?;

    // ==========================================================================
    // Appropriation items (amounts in integer cents, NULL = absent)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS appropriation_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id INTEGER NOT NULL REFERENCES bills(id),
            group_index INTEGER NOT NULL,
            section_number TEXT,
            agency_code TEXT,
            project_code TEXT,
            appropriation_kind TEXT NOT NULL,
            account_label TEXT NOT NULL,
            account_name TEXT NOT NULL,
            account_code TEXT,
            fund_type TEXT,
            fiscal_year INTEGER,
            biennium TEXT,
            old_cents INTEGER,
            new_cents INTEGER,
            change_cents INTEGER,
            is_amended INTEGER NOT NULL,
            is_total_row INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS provisos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id INTEGER NOT NULL REFERENCES bills(id),
            section_number TEXT NOT NULL,
            agency_code TEXT,
            number INTEGER,
            text TEXT NOT NULL,
            categories TEXT NOT NULL,
            provided_solely INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS statutory_references (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id INTEGER NOT NULL REFERENCES bills(id),
            kind TEXT NOT NULL,
            citation TEXT NOT NULL,
            section_numbers TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vetoes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id INTEGER NOT NULL REFERENCES bills(id),
            section_number TEXT NOT NULL,
            scope TEXT NOT NULL,
            veto_kind TEXT NOT NULL,
            note TEXT,
            struck_lines TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Extraction log (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS extraction_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_agency_biennium ON appropriation_items(agency_code, biennium)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_bill ON appropriation_items(bill_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_log_fingerprint ON extraction_log(fingerprint)",
        [],
    )?;

    Ok(())
}

/// Persist one extraction in a single transaction.
///
/// A document whose fingerprint is already stored is skipped and logged.
pub fn insert_extraction(conn: &mut Connection, output: &ExtractionOutput) -> Result<ImportOutcome> {
    let fingerprint = output.fingerprint();
    let tx = conn.transaction().context("Failed to start import transaction")?;

    let bill = &output.bill;
    let output_json = serde_json::to_string(output)?;
    let result = tx.execute(
        "INSERT INTO bills (
            fingerprint, short_bill_id, long_bill_id, legislature, session,
            brief_description, kind, biennium, chapter_year, chapter_number,
            line_count, grand_total_cents, warning_count, run_id, extracted_at, output
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            fingerprint,
            bill.short_bill_id,
            bill.long_bill_id,
            bill.legislature,
            bill.session,
            bill.brief_description,
            bill.kind.as_str(),
            bill.biennium.map(|b| b.to_string()),
            bill.chapter_law.as_ref().and_then(|c| c.year),
            bill.chapter_law.as_ref().and_then(|c| c.number.clone()),
            output.line_item_count() as i64,
            output.fiscal.grand_total.new.cents(),
            output.warnings.len() as i64,
            output.run.run_id,
            output.run.extracted_at.to_rfc3339(),
            output_json,
        ],
    );

    let bill_id = match result {
        Ok(_) => tx.last_insert_rowid(),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let event = Event::new(
                "bill_skipped_duplicate",
                &fingerprint,
                serde_json::json!({ "shortBillId": bill.short_bill_id }),
                "importer",
            );
            insert_event(&tx, &event)?;
            tx.commit()?;
            tracing::info!(fingerprint = %fingerprint, "bill already imported");
            return Ok(ImportOutcome::AlreadyImported);
        }
        Err(e) => return Err(e.into()),
    };

    for agency in &output.agencies {
        tx.execute(
            "INSERT INTO agencies (bill_id, code, name, index_name, section_numbers)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bill_id,
                agency.code,
                agency.name,
                agency.index_name,
                serde_json::to_string(&agency.section_numbers)?,
            ],
        )?;
    }

    let items = insert_items(&tx, bill_id, output)?;

    for proviso in &output.provisos {
        tx.execute(
            "INSERT INTO provisos (bill_id, section_number, agency_code, number, text, categories, provided_solely)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bill_id,
                proviso.section_number,
                proviso.agency_code,
                proviso.number,
                proviso.text,
                serde_json::to_string(&proviso.categories)?,
                proviso.provided_solely,
            ],
        )?;
    }

    for reference in &output.statutory_references {
        tx.execute(
            "INSERT INTO statutory_references (bill_id, kind, citation, section_numbers)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                bill_id,
                reference.kind.as_str(),
                reference.citation,
                serde_json::to_string(&reference.section_numbers)?,
            ],
        )?;
    }

    for veto in &output.vetoes {
        tx.execute(
            "INSERT INTO vetoes (bill_id, section_number, scope, veto_kind, note, struck_lines)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bill_id,
                veto.section_number,
                veto.scope.as_str(),
                veto.veto_kind,
                veto.note,
                serde_json::to_string(&veto.struck_lines)?,
            ],
        )?;
    }

    let event = Event::new(
        "bill_imported",
        &fingerprint,
        serde_json::json!({
            "shortBillId": bill.short_bill_id,
            "items": items,
            "provisos": output.provisos.len(),
            "warnings": output.warnings.len(),
        }),
        "importer",
    );
    insert_event(&tx, &event)?;
    tx.commit().context("Failed to commit import")?;

    tracing::info!(bill_id, items, "bill imported");
    Ok(ImportOutcome::Inserted { bill_id, items })
}

fn insert_items(tx: &Transaction, bill_id: i64, output: &ExtractionOutput) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO appropriation_items (
            bill_id, group_index, section_number, agency_code, project_code,
            appropriation_kind, account_label, account_name, account_code, fund_type,
            fiscal_year, biennium, old_cents, new_cents, change_cents, is_amended, is_total_row
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )?;

    let mut count = 0;
    for (group_index, group) in output.appropriations.iter().enumerate() {
        for item in &group.items {
            stmt.execute(params![
                bill_id,
                group_index as i64,
                item.section_number,
                item.agency_code,
                group.project_code,
                group.kind.as_str(),
                item.account_label,
                item.account_name,
                item.account_code,
                item.fund_type.map(|f| f.as_str()),
                item.fiscal_year,
                item.biennium.map(|b| b.to_string()),
                item.amount.old_amount.map(Money::cents),
                item.amount.new_amount.map(Money::cents),
                item.amount.change_amount.map(Money::cents),
                item.amount.is_amended,
                item.is_total_row,
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO extraction_log (
            event_id, timestamp, event_type, fingerprint, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.fingerprint,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit events for one document fingerprint, oldest first
pub fn get_events_for_bill(conn: &Connection, fingerprint: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, fingerprint, data, actor
         FROM extraction_log WHERE fingerprint = ?1 ORDER BY id",
    )?;

    let rows = stmt.query_map(params![fingerprint], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (event_id, timestamp, event_type, fingerprint, data, actor) = row?;
        events.push(Event {
            event_id,
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .context("Invalid event timestamp")?
                .with_timezone(&Utc),
            event_type,
            fingerprint,
            data: serde_json::from_str(&data).context("Invalid event data")?,
            actor,
        });
    }
    Ok(events)
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn count_bills(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_items(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM appropriation_items", [], |row| row.get(0))?;
    Ok(count)
}

pub fn is_imported(conn: &Connection, fingerprint: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bills WHERE fingerprint = ?1",
        params![fingerprint],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Stored output of every imported bill, import order
pub fn load_outputs(conn: &Connection) -> Result<Vec<ExtractionOutput>> {
    let mut stmt = conn.prepare("SELECT output FROM bills ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut outputs = Vec::new();
    for row in rows {
        let json = row?;
        outputs.push(serde_json::from_str(&json).context("Failed to deserialize stored bill")?);
    }
    Ok(outputs)
}

/// Summed new amounts per (agency, biennium) across every stored bill.
/// Total rows and rows with no biennium are left out.
pub fn agency_biennium_totals(conn: &Connection) -> Result<Vec<(String, Biennium, Money)>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(agency_code, 'ungrouped'), biennium, COALESCE(SUM(new_cents), 0)
         FROM appropriation_items
         WHERE is_total_row = 0 AND biennium IS NOT NULL
         GROUP BY 1, 2
         ORDER BY 1, 2",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut totals = Vec::new();
    for row in rows {
        let (agency, biennium, cents) = row?;
        let biennium = Biennium::try_from(biennium).map_err(anyhow::Error::msg)?;
        totals.push((agency, biennium, Money::from_cents(cents)));
    }
    Ok(totals)
}

/// Cross-bill timeline from the store
pub fn load_timeline(conn: &Connection) -> Result<Timeline> {
    let mut timeline = Timeline::new();
    for (agency, biennium, amount) in agency_biennium_totals(conn)? {
        timeline.record(&agency, biennium, amount);
    }
    timeline.bills = count_bills(conn)? as usize;
    Ok(timeline)
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
  <ShortBillId>SB 5187</ShortBillId>
  <BillBody>
    <BillSection>
      <BillSectionHeader>
        <BillSectionNumber><Value>102</Value></BillSectionNumber>
        <Department><Index>SENATE</Index><DeptName>FOR THE SENATE</DeptName></Department>
      </BillSectionHeader>
      <Appropriations agency="046">
        <Appropriation><AccountName>General Fund-State Appropriation (FY 2024)</AccountName><DollarAmount>$1,000</DollarAmount></Appropriation>
        <Appropriation><AccountName>General Fund-State Appropriation (FY 2025)</AccountName><DollarAmount><TextRun amendingStyle="strike">$2,000</TextRun><TextRun amendingStyle="add">$2,500</TextRun></DollarAmount></Appropriation>
        <AppropriationTotal><DollarAmount>$3,500</DollarAmount></AppropriationTotal>
      </Appropriations>
    </BillSection>
  </BillBody>
</Bill>"#;

    fn extracted() -> ExtractionOutput {
        let tree = DocumentTree::from_xml(BILL).unwrap();
        BillExtractor::new().extract(&tree).unwrap()
    }

    #[test]
    fn test_idempotency_import_twice() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let output = extracted();

        let first = insert_extraction(&mut conn, &output).unwrap();
        assert!(matches!(first, ImportOutcome::Inserted { items: 3, .. }));

        let second = insert_extraction(&mut conn, &output).unwrap();
        assert_eq!(second, ImportOutcome::AlreadyImported);

        assert_eq!(count_bills(&conn).unwrap(), 1);
        assert_eq!(count_items(&conn).unwrap(), 3);
        assert!(is_imported(&conn, &output.fingerprint()).unwrap());

        let events = get_events_for_bill(&conn, &output.fingerprint()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "bill_imported");
        assert_eq!(events[1].event_type, "bill_skipped_duplicate");
        println!("✅ Second import skipped, {} audit events", events.len());
    }

    #[test]
    fn test_totals_and_timeline_from_store() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        insert_extraction(&mut conn, &extracted()).unwrap();

        let totals = agency_biennium_totals(&conn).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0], ("046".to_string(), Biennium::new(2023, 2025), Money::from_dollars(1_000)));
        assert_eq!(totals[1], ("046".to_string(), Biennium::new(2025, 2027), Money::from_dollars(2_500)));

        let timeline = load_timeline(&conn).unwrap();
        assert_eq!(timeline.bills, 1);
        assert_eq!(timeline.amount("046", Biennium::new(2025, 2027)), Money::from_dollars(2_500));
    }

    #[test]
    fn test_stored_output_round_trips() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let output = extracted();
        insert_extraction(&mut conn, &output).unwrap();

        let stored = load_outputs(&conn).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fiscal, output.fiscal);
        assert_eq!(stored[0].bill.short_bill_id.as_deref(), Some("SB 5187"));
    }
}
