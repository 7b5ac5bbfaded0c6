// WA Budget Extract - Core Library
// Structural extraction and amendment reconciliation for Washington State
// appropriations bills. Exposes all modules for the CLI and tests.

pub mod tree;           // Document tree + XML loader
pub mod schema;         // Shape Layer - tag/attribute mapping per schema version
pub mod error;          // Local warnings vs. fatal errors
pub mod money;          // Integer-cents currency
pub mod amendment;      // Strike/add runs → old/new/change
pub mod fiscal_period;  // Fiscal year + biennium inference
pub mod walker;         // Single-pass context index
pub mod appropriations; // Appropriation Extractor
pub mod provisos;       // Proviso Classifier (rules as data)
pub mod references;     // Statutory references + amended statutes
pub mod vetoes;         // Section and line vetoes
pub mod aggregate;      // Fiscal Aggregator
pub mod reconciliation; // Declared totals vs. summed lines
pub mod timeline;       // Cross-bill funding history
pub mod entities;       // Agency registry
pub mod extract;        // BillExtractor pipeline
pub mod db;             // SQLite persistence
pub mod export;         // CSV export

// Re-export commonly used types
pub use tree::{DocumentTree, Node, NodeId, NodeKind};
pub use schema::{LegislativeSchema, NodeRole, SchemaAdapter, SchemaMapping};
pub use error::{ExtractionError, ExtractionWarning, Warnings};
pub use money::{parse_money, Money, MoneyParseError};
pub use amendment::{resolve_amount, AmendingStyle, ResolvedAmount, StyledRun};
pub use fiscal_period::{infer_fiscal_period, Biennium, FiscalPeriod};
pub use walker::{ContextIndex, NodeContext, PartFrame, SectionFrame};
pub use appropriations::{
    AccountType, AppropriationExtractor, AppropriationGroup, AppropriationItem,
    AppropriationKind, FundType,
};
pub use provisos::{CategoryRule, Proviso, ProvisoClassifier, ProvisoRuleSet};
pub use references::{AmendedStatute, ReferenceCollector, ReferenceKind, StatutoryReference};
pub use vetoes::{VetoRecord, VetoScope};
pub use aggregate::{FiscalAggregate, Totals};
pub use reconciliation::{
    GroupReconciliation, ReconciliationEngine, ReconciliationReport, ReconciliationResult,
};
pub use timeline::{ChangeKind, FundingChange, Timeline, TimelineChanges};
pub use entities::{Agency, AgencyRegistry};
pub use extract::{
    AmendmentStats, BillExtractor, BillKind, BillMetadata, ExtractionOutput, ExtractorConfig,
    Part, Section,
};
pub use db::{
    Event, ImportOutcome,
    setup_database, insert_extraction, insert_event, get_events_for_bill,
    count_bills, count_items, is_imported, load_outputs, load_timeline,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
