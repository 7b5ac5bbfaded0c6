// 🏛️ Agency Entity - Stable code + display names
//
// "The agency CODE is identity, its heading text is a value"
//
// Problem solved:
// - "FOR THE SENATE", "SENATE", agency="046" → one agency
// - Sections reference an agency; they never own it

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// AGENCY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    /// Short identifier (numeric agency code, or the department index
    /// name when the bill carries no code)
    pub code: String,

    /// Display name from the department heading
    pub name: Option<String>,

    /// Department index name
    pub index_name: Option<String>,

    /// Other headings seen for the same code
    pub aliases: Vec<String>,

    /// Sections that reference this agency, document order
    pub section_numbers: Vec<String>,
}

impl Agency {
    pub fn new(code: &str) -> Self {
        Agency {
            code: code.to_string(),
            name: None,
            index_name: None,
            aliases: Vec::new(),
            section_numbers: Vec::new(),
        }
    }

    /// Record a heading; the first one becomes the display name
    pub fn add_name(&mut self, name: &str) {
        match &self.name {
            None => self.name = Some(name.to_string()),
            Some(current) if current == name => {}
            Some(_) => {
                if !self.aliases.iter().any(|a| a == name) {
                    self.aliases.push(name.to_string());
                }
            }
        }
    }

    /// Case-insensitive match on code, display name, index name or alias
    pub fn matches(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        self.all_names().iter().any(|n| n.to_lowercase() == needle)
    }

    pub fn all_names(&self) -> Vec<String> {
        let mut names = vec![self.code.clone()];
        names.extend(self.name.clone());
        names.extend(self.index_name.clone());
        names.extend(self.aliases.clone());
        names
    }
}

// ============================================================================
// AGENCY REGISTRY
// ============================================================================

/// Per-bill registry: agencies deduplicated by code, insertion order kept.
#[derive(Debug, Clone, Default)]
pub struct AgencyRegistry {
    agencies: Vec<Agency>,
    by_code: HashMap<String, usize>,
}

impl AgencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference from `section_number` to the agency `code`.
    ///
    /// Creates the agency on first sight; later references only add
    /// names and section links.
    pub fn link(
        &mut self,
        code: &str,
        name: Option<&str>,
        index_name: Option<&str>,
        section_number: Option<&str>,
    ) -> &Agency {
        let idx = match self.by_code.get(code) {
            Some(&idx) => idx,
            None => {
                self.agencies.push(Agency::new(code));
                self.by_code.insert(code.to_string(), self.agencies.len() - 1);
                self.agencies.len() - 1
            }
        };

        let agency = &mut self.agencies[idx];
        if let Some(name) = name {
            agency.add_name(name);
        }
        if agency.index_name.is_none() {
            agency.index_name = index_name.map(str::to_string);
        }
        if let Some(section) = section_number {
            if !agency.section_numbers.iter().any(|s| s == section) {
                agency.section_numbers.push(section.to_string());
            }
        }
        &self.agencies[idx]
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Agency> {
        self.by_code.get(code).map(|&idx| &self.agencies[idx])
    }

    /// Lookup by code or any known name
    pub fn find_by_string(&self, text: &str) -> Option<&Agency> {
        self.find_by_code(text.trim())
            .or_else(|| self.agencies.iter().find(|a| a.matches(text)))
    }

    /// Display name for a code or heading
    pub fn normalize(&self, text: &str) -> Option<String> {
        self.find_by_string(text)
            .and_then(|a| a.name.clone().or_else(|| a.index_name.clone()))
    }

    pub fn all(&self) -> &[Agency] {
        &self.agencies
    }

    pub fn count(&self) -> usize {
        self.agencies.len()
    }

    pub fn into_vec(self) -> Vec<Agency> {
        self.agencies
    }
}

// ============================================================================
// TESTS
// ============================================================================
