use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wa_budget_extract::{
    count_bills, count_items, export, insert_extraction, load_outputs, load_timeline,
    setup_database, Biennium, BillExtractor, DocumentTree, ExtractionOutput, ExtractorConfig,
    FiscalAggregate, ImportOutcome, ProvisoRuleSet, SchemaMapping,
};

const DEFAULT_DB: &str = "wa_budget.db";

fn main() -> Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("extract") => run_extract(&args[2..])?,
        Some("import") => run_import(&args[2..])?,
        Some("export") => run_export(&args[2..])?,
        Some("timeline") => run_timeline()?,
        _ => print_usage(),
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("WA_BUDGET_LOG_JSON").map_or(false, |v| v == "1" || v == "true");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_usage() {
    println!("📜 WA Budget Extract {}", wa_budget_extract::VERSION);
    println!();
    println!("Usage:");
    println!("  wa-budget-extract extract <bill.xml> [output.json]");
    println!("  wa-budget-extract import <bill.xml>...");
    println!("  wa-budget-extract export <items.csv> <summary.csv>");
    println!("  wa-budget-extract timeline");
    println!();
    println!("Environment:");
    println!("  WA_BUDGET_DB        SQLite database (default {})", DEFAULT_DB);
    println!("  WA_BUDGET_SCHEMA    JSON schema mapping override");
    println!("  WA_BUDGET_RULES     JSON proviso rule table override");
    println!("  WA_BUDGET_BIENNIUM  Biennium hint, e.g. 2023-2025");
    println!("  WA_BUDGET_LOG_JSON  1 for JSON logs");
}

// ============================================================================
// CONFIGURATION
// ============================================================================

fn load_config() -> Result<ExtractorConfig> {
    let mut config = ExtractorConfig::new();
    if let Ok(path) = env::var("WA_BUDGET_SCHEMA") {
        config = config.with_schema(SchemaMapping::from_file(&path)?);
    }
    if let Ok(path) = env::var("WA_BUDGET_RULES") {
        config = config.with_rules(ProvisoRuleSet::from_file(&path)?);
    }
    if let Ok(value) = env::var("WA_BUDGET_BIENNIUM") {
        let biennium = Biennium::parse_loose(&value)
            .with_context(|| format!("WA_BUDGET_BIENNIUM is not a biennium: {:?}", value))?;
        config = config.with_biennium_hint(biennium);
    }
    Ok(config)
}

fn db_path() -> PathBuf {
    env::var("WA_BUDGET_DB").map_or_else(|_| PathBuf::from(DEFAULT_DB), PathBuf::from)
}

fn open_database() -> Result<Connection> {
    let path = db_path();
    let conn = Connection::open(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn extract_file(extractor: &BillExtractor, path: &Path) -> Result<ExtractionOutput> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let tree = DocumentTree::from_xml(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let output = extractor
        .extract(&tree)
        .with_context(|| format!("Failed to extract {}", path.display()))?;
    Ok(output)
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_extract(args: &[String]) -> Result<()> {
    let Some(input) = args.first() else {
        bail!("extract needs an input file");
    };
    let extractor = BillExtractor::from_config(&load_config()?)?;
    let output = extract_file(&extractor, Path::new(input))?;
    let json = serde_json::to_string_pretty(&output)?;

    match args.get(1) {
        Some(out_path) => {
            fs::write(out_path, json).with_context(|| format!("Failed to write {}", out_path))?;
            println!("✓ {}", output.summary());
            println!("✓ Written to {}", out_path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_import(args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("import needs at least one input file");
    }

    println!("🗄️  Bill Import - XML → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let extractor = BillExtractor::from_config(&load_config()?)?;
    let mut conn = open_database()?;
    println!("✓ Database ready at {}", db_path().display());

    let mut imported = 0;
    let mut skipped = 0;
    for input in args {
        println!("\n📂 {}", input);
        let output = extract_file(&extractor, Path::new(input))?;
        println!("✓ {}", output.summary());
        if !output.reconciliation.is_balanced() {
            println!("⚠️  {}", output.reconciliation.summary());
        }

        match insert_extraction(&mut conn, &output)? {
            ImportOutcome::Inserted { items, .. } => {
                imported += 1;
                println!("💾 Inserted {} appropriation rows", items);
            }
            ImportOutcome::AlreadyImported => {
                skipped += 1;
                println!("↩️  Already imported, skipped");
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Imported: {}  Skipped: {}", imported, skipped);
    println!("✓ Database contains {} bills, {} appropriation rows", count_bills(&conn)?, count_items(&conn)?);
    Ok(())
}

fn run_export(args: &[String]) -> Result<()> {
    let (Some(items_path), Some(summary_path)) = (args.first(), args.get(1)) else {
        bail!("export needs <items.csv> <summary.csv>");
    };

    let conn = open_database()?;
    let outputs = load_outputs(&conn)?;

    let mut aggregate = FiscalAggregate::new();
    for output in &outputs {
        aggregate.merge(&output.fiscal);
    }

    let items = export::export_items(Path::new(items_path), &outputs)?;
    let summaries = export::export_summary(Path::new(summary_path), &aggregate)?;
    println!("📤 {} item rows → {}", items, items_path);
    println!("📤 {} summary rows → {}", summaries, summary_path);
    Ok(())
}

fn run_timeline() -> Result<()> {
    let conn = open_database()?;
    let timeline = load_timeline(&conn)?;
    let changes = timeline.changes();

    println!("📈 Timeline: {} agencies across {} bills", timeline.agencies.len(), timeline.bills);
    println!("  Growth: {}", changes.growth.len());
    println!("  Cuts: {}", changes.cuts.len());
    println!("  New: {}", changes.new_programs.len());
    println!("  Discontinued: {}", changes.discontinued.len());
    println!("  Stable: {}", changes.stable.len());
    println!("{}", serde_json::to_string_pretty(&changes)?);
    Ok(())
}
