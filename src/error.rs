// ⚠️ Extraction Errors - Local warnings vs. fatal failures
//
// Every problem found inside one node is recovered locally: the offending
// value is left absent and a warning is appended to the side channel.
// Only a document without a bill body aborts extraction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// LOCAL WARNINGS (never fatal)
// ============================================================================

/// Diagnostics collected while extracting one bill.
///
/// Serialized with a `kind` tag so downstream consumers can filter them
/// without parsing the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExtractionWarning {
    /// Currency literal that does not parse. The amount is left absent.
    #[error("malformed amount {literal:?} in section {}", display_section(.section_number))]
    #[serde(rename_all = "camelCase")]
    MalformedAmount {
        section_number: Option<String>,
        literal: String,
    },

    /// Appropriation or proviso node lacking a required field or ancestor.
    #[error("missing context in section {}: {detail}", display_section(.section_number))]
    #[serde(rename_all = "camelCase")]
    MissingSectionContext {
        section_number: Option<String>,
        detail: String,
    },

    /// Neither a fiscal year nor a biennium could be read from an account label.
    #[error("no fiscal period in {label:?} (section {})", display_section(.section_number))]
    #[serde(rename_all = "camelCase")]
    AmbiguousFiscalPeriod {
        section_number: Option<String>,
        label: String,
    },

    /// Veto attribute value outside the known set.
    #[error("unknown veto markup {attribute}={value:?} in section {}", display_section(.section_number))]
    #[serde(rename_all = "camelCase")]
    UnknownVetoMarkup {
        section_number: Option<String>,
        attribute: String,
        value: String,
    },
}

fn display_section(section: &Option<String>) -> &str {
    section.as_deref().unwrap_or("?")
}

impl ExtractionWarning {
    /// Short machine name, matches the serialized `kind` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionWarning::MalformedAmount { .. } => "malformedAmount",
            ExtractionWarning::MissingSectionContext { .. } => "missingSectionContext",
            ExtractionWarning::AmbiguousFiscalPeriod { .. } => "ambiguousFiscalPeriod",
            ExtractionWarning::UnknownVetoMarkup { .. } => "unknownVetoMarkup",
        }
    }

    pub fn section_number(&self) -> Option<&str> {
        match self {
            ExtractionWarning::MalformedAmount { section_number, .. }
            | ExtractionWarning::MissingSectionContext { section_number, .. }
            | ExtractionWarning::AmbiguousFiscalPeriod { section_number, .. }
            | ExtractionWarning::UnknownVetoMarkup { section_number, .. } => {
                section_number.as_deref()
            }
        }
    }
}

// ============================================================================
// WARNING SINK
// ============================================================================

/// Append-only list of warnings, passed explicitly through one extraction.
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    items: Vec<ExtractionWarning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ExtractionWarning) {
        tracing::warn!(kind = warning.kind(), "{}", warning);
        self.items.push(warning);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractionWarning> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<ExtractionWarning> {
        self.items
    }
}

// ============================================================================
// FATAL ERRORS
// ============================================================================

/// Errors that abort extraction of a whole document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document has no <{0}> element")]
    MissingBillBody(String),

    #[error("document is not well-formed: {0}")]
    MalformedDocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_and_kind() {
        let w = ExtractionWarning::MalformedAmount {
            section_number: Some("101".to_string()),
            literal: "$12,3x4".to_string(),
        };
        assert_eq!(w.kind(), "malformedAmount");
        assert_eq!(w.section_number(), Some("101"));
        assert!(w.to_string().contains("section 101"));

        let w = ExtractionWarning::MissingSectionContext {
            section_number: None,
            detail: "appropriation has no account name".to_string(),
        };
        assert!(w.to_string().contains("section ?"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = ExtractionWarning::UnknownVetoMarkup {
            section_number: Some("7".to_string()),
            attribute: "veto".to_string(),
            value: "maybe".to_string(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "unknownVetoMarkup");
        assert_eq!(json["sectionNumber"], "7");
        assert_eq!(json["value"], "maybe");
    }

    #[test]
    fn test_warning_sink_preserves_order() {
        let mut sink = Warnings::new();
        assert!(sink.is_empty());
        sink.push(ExtractionWarning::AmbiguousFiscalPeriod {
            section_number: None,
            label: "Prior Biennia (Expenditures)".to_string(),
        });
        sink.push(ExtractionWarning::MalformedAmount {
            section_number: None,
            literal: "n/a".to_string(),
        });
        assert_eq!(sink.len(), 2);
        let kinds: Vec<_> = sink.iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, vec!["ambiguousFiscalPeriod", "malformedAmount"]);
    }
}
