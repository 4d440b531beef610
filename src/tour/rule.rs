//! Detection rules: data describing what evidence satisfies a gated step

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::RegionRef;

/// Synonyms per block concept, tolerating localized or reworded block labels
pub const CONCEPT_SYNONYMS: &[(&str, &[&str])] = &[
    ("repetir", &["repetir", "repeat", "para", "loop", "veces", "times"]),
    ("mostrar", &["mostrar", "show", "print", "imprimir"]),
    ("texto", &["texto", "text", "string", "hola", "hello"]),
    ("numero", &["numero", "número", "number"]),
    ("5", &["5", "cinco", "five"]),
];

/// Look up the synonym set for a concept
pub fn synonyms_for(concept: &str) -> &'static [&'static str] {
    CONCEPT_SYNONYMS
        .iter()
        .find(|(name, _)| *name == concept)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or(&[])
}

/// Evidence that a gated step's action happened.
///
/// Checked most to least specific: exact keywords in region text, then
/// case-insensitive synonyms and regex patterns, then tokens in the
/// generated program text. `accept_presence` short-circuits on the region
/// merely being rendered (e.g. a panel that was opened).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRule {
    /// Regions whose rendered text is inspected
    #[serde(default)]
    pub regions: Vec<RegionRef>,
    /// Exact (case-sensitive) substrings
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Case-insensitive substrings
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Regular expressions matched against region text
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Substrings of the generated program text
    #[serde(default)]
    pub code_tokens: Vec<String>,
    /// A rendered region is enough evidence on its own
    #[serde(default)]
    pub accept_presence: bool,
}

impl DetectionRule {
    /// Rule inspecting a single region
    pub fn in_region(region: impl Into<RegionRef>) -> Self {
        Self {
            regions: vec![region.into()],
            ..Self::default()
        }
    }

    /// Satisfied as soon as the region is rendered
    pub fn region_rendered(region: impl Into<RegionRef>) -> Self {
        Self {
            accept_presence: true,
            ..Self::in_region(region)
        }
    }

    /// Keyword plus its synonym set from [`CONCEPT_SYNONYMS`]
    pub fn concept(mut self, concept: &str) -> Self {
        self.keywords.push(concept.to_string());
        self.synonyms
            .extend(synonyms_for(concept).iter().map(|s| (*s).to_string()));
        self
    }

    pub fn also_in(mut self, region: impl Into<RegionRef>) -> Self {
        self.regions.push(region.into());
        self
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.keywords.push(keyword.to_string());
        self
    }

    pub fn synonym(mut self, synonym: &str) -> Self {
        self.synonyms.push(synonym.to_string());
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_string());
        self
    }

    pub fn code_token(mut self, token: &str) -> Self {
        self.code_tokens.push(token.to_string());
        self
    }

    /// Whether the rule names any evidence at all
    pub fn has_evidence(&self) -> bool {
        let inspects_regions = !self.regions.is_empty()
            && (self.accept_presence
                || !self.keywords.is_empty()
                || !self.synonyms.is_empty()
                || !self.patterns.is_empty());
        inspects_regions || !self.code_tokens.is_empty()
    }
}

impl fmt::Display for DetectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions: Vec<&str> = self.regions.iter().map(RegionRef::as_str).collect();
        write!(f, "regions=[{}]", regions.join(", "))?;
        if self.accept_presence {
            f.write_str(" presence")?;
        }
        if !self.keywords.is_empty() {
            write!(f, " keywords={:?}", self.keywords)?;
        }
        if !self.code_tokens.is_empty() {
            write!(f, " code={:?}", self.code_tokens)?;
        }
        Ok(())
    }
}
