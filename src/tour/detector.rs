//! Action detection via rendered-text and generated-code matching
//!
//! The detector answers one question for a gated step: does the editor show
//! evidence that the learner did what the step asked? It holds no per-run
//! state; the only thing it keeps between calls is a cache of compiled
//! regex patterns.

use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

use super::catalog::StepCatalog;
use super::rule::DetectionRule;
use super::surface::{EditorSurface, UiSnapshot};
use super::types::RegionRef;

/// A rule the detector cannot evaluate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("detection rule names no evidence")]
    EmptyRule,

    #[error("invalid detection pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Which piece of evidence satisfied a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// The region is rendered and the rule accepts presence
    Rendered(RegionRef),
    /// Exact keyword found in a region
    Keyword { region: RegionRef, keyword: String },
    /// Case-insensitive synonym found in a region
    Synonym { region: RegionRef, synonym: String },
    /// Regex pattern matched a region
    Pattern { region: RegionRef, pattern: String },
    /// Token found in the generated program
    CodeToken(String),
}

/// Evaluates detection rules against editor snapshots
#[derive(Debug, Default)]
pub struct ActionDetector {
    /// Patterns compiled ahead of time
    compiled: HashMap<String, Regex>,
    /// Patterns that failed to compile, with the compiler's message
    invalid: HashMap<String, String>,
}

impl ActionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with every pattern in the catalog precompiled
    pub fn for_catalog(catalog: &StepCatalog) -> Self {
        let mut detector = Self::new();
        for step in catalog.steps() {
            if let Some(rule) = &step.rule {
                detector.add_patterns(rule.patterns.iter().map(String::as_str));
            }
        }
        detector
    }

    /// Compile and cache patterns; invalid ones are logged and remembered
    pub fn add_patterns<'a>(&mut self, patterns: impl IntoIterator<Item = &'a str>) {
        for pattern in patterns {
            if self.compiled.contains_key(pattern) || self.invalid.contains_key(pattern) {
                continue;
            }
            match Regex::new(pattern) {
                Ok(regex) => {
                    self.compiled.insert(pattern.to_string(), regex);
                }
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Failed to compile detection pattern");
                    self.invalid.insert(pattern.to_string(), e.to_string());
                }
            }
        }
    }

    fn resolve_patterns(&self, rule: &DetectionRule) -> Result<Vec<(String, Regex)>, DetectionError> {
        rule.patterns
            .iter()
            .map(|pattern| {
                if let Some(message) = self.invalid.get(pattern) {
                    return Err(DetectionError::InvalidPattern {
                        pattern: pattern.clone(),
                        message: message.clone(),
                    });
                }
                let regex = match self.compiled.get(pattern) {
                    Some(regex) => regex.clone(),
                    None => Regex::new(pattern).map_err(|e| DetectionError::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?,
                };
                Ok((pattern.clone(), regex))
            })
            .collect()
    }

    /// Evaluate a rule, reporting the most specific evidence found.
    ///
    /// A region missing from the snapshot is simply not evidence; only a
    /// malformed rule is an error.
    pub fn try_evaluate(
        &self,
        rule: &DetectionRule,
        snapshot: &UiSnapshot,
    ) -> Result<Option<Evidence>, DetectionError> {
        if !rule.has_evidence() {
            return Err(DetectionError::EmptyRule);
        }
        let patterns = self.resolve_patterns(rule)?;

        let rendered: Vec<(&RegionRef, &str)> = rule
            .regions
            .iter()
            .filter_map(|region| snapshot.region_text(region).map(|text| (region, text)))
            .collect();

        // 1. Direct containment
        for (region, text) in &rendered {
            if rule.accept_presence {
                return Ok(Some(Evidence::Rendered((*region).clone())));
            }
            if let Some(keyword) = rule
                .keywords
                .iter()
                .find(|k| !k.is_empty() && text.contains(k.as_str()))
            {
                return Ok(Some(Evidence::Keyword {
                    region: (*region).clone(),
                    keyword: keyword.clone(),
                }));
            }
        }

        // 2. Synonyms and patterns
        for (region, text) in &rendered {
            let lowered = text.to_lowercase();
            if let Some(synonym) = rule
                .synonyms
                .iter()
                .find(|s| !s.is_empty() && lowered.contains(&s.to_lowercase()))
            {
                return Ok(Some(Evidence::Synonym {
                    region: (*region).clone(),
                    synonym: synonym.clone(),
                }));
            }
            if let Some((pattern, _)) = patterns.iter().find(|(_, regex)| regex.is_match(text)) {
                return Ok(Some(Evidence::Pattern {
                    region: (*region).clone(),
                    pattern: pattern.clone(),
                }));
            }
        }

        // 3. Generated program text
        if let Some(code) = snapshot.generated_code() {
            if let Some(token) = rule
                .code_tokens
                .iter()
                .find(|t| !t.is_empty() && code.contains(t.as_str()))
            {
                return Ok(Some(Evidence::CodeToken(token.clone())));
            }
        }

        Ok(None)
    }

    /// Evaluate a rule; malformed rules count as "not yet satisfied"
    pub fn evaluate(&self, rule: &DetectionRule, snapshot: &UiSnapshot) -> bool {
        match self.try_evaluate(rule, snapshot) {
            Ok(Some(evidence)) => {
                tracing::debug!(rule = %rule, evidence = ?evidence, "Detection rule satisfied");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(rule = %rule, error = %e, "Detection rule could not be evaluated");
                false
            }
        }
    }

    /// Capture a fresh snapshot from the surface and evaluate against it
    pub fn evaluate_surface(&self, rule: &DetectionRule, surface: &dyn EditorSurface) -> bool {
        let snapshot = UiSnapshot::capture(surface, rule);
        self.evaluate(rule, &snapshot)
    }

    /// Check if a pattern has been compiled successfully
    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.compiled.contains_key(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::surface::InMemorySurface;

    const CANVAS: &str = ".blocklyBlockCanvas";

    fn region(name: &str) -> RegionRef {
        RegionRef::new(name)
    }

    #[test]
    fn test_keyword_match() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS).keyword("repeat");
        let snapshot = UiSnapshot::new().with_region(CANVAS, "repeat 5 times");

        assert!(detector.evaluate(&rule, &snapshot));
        assert_eq!(
            detector.try_evaluate(&rule, &snapshot).unwrap(),
            Some(Evidence::Keyword {
                region: region(CANVAS),
                keyword: "repeat".to_string()
            })
        );
    }

    #[test]
    fn test_keyword_is_case_sensitive_synonym_is_not() {
        let detector = ActionDetector::new();
        let snapshot = UiSnapshot::new().with_region(CANVAS, "Repetir 5 veces");

        let exact = DetectionRule::in_region(CANVAS).keyword("repetir");
        assert!(!detector.evaluate(&exact, &snapshot));

        let loose = DetectionRule::in_region(CANVAS).concept("repetir");
        assert_eq!(
            detector.try_evaluate(&loose, &snapshot).unwrap(),
            Some(Evidence::Synonym {
                region: region(CANVAS),
                synonym: "repetir".to_string()
            })
        );
    }

    #[test]
    fn test_keyword_takes_precedence_over_synonym() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS)
            .synonym("loop")
            .keyword("repetir");
        let snapshot = UiSnapshot::new().with_region(CANVAS, "loop / repetir");

        assert!(matches!(
            detector.try_evaluate(&rule, &snapshot).unwrap(),
            Some(Evidence::Keyword { .. })
        ));
    }

    #[test]
    fn test_missing_region_is_not_satisfied() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS).concept("mostrar");
        assert_eq!(detector.try_evaluate(&rule, &UiSnapshot::new()), Ok(None));
        assert!(!detector.evaluate(&rule, &UiSnapshot::new()));
    }

    #[test]
    fn test_presence_rule() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::region_rendered("[data-tour=\"blocks-panel\"]");

        assert!(!detector.evaluate(&rule, &UiSnapshot::new()));
        let open = UiSnapshot::new().with_region("[data-tour=\"blocks-panel\"]", "");
        assert!(detector.evaluate(&rule, &open));
    }

    #[test]
    fn test_code_fallback() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS)
            .keyword("mostrar")
            .code_token("mostrar");

        // Canvas rendered differently, but the generated code has the token
        let snapshot = UiSnapshot::new()
            .with_region(CANVAS, "⚙")
            .with_code("mostrar \"Hola\"");
        assert_eq!(
            detector.try_evaluate(&rule, &snapshot).unwrap(),
            Some(Evidence::CodeToken("mostrar".to_string()))
        );

        // Code view without the token
        let snapshot = UiSnapshot::new().with_code("repetir 5 veces:");
        assert!(!detector.evaluate(&rule, &snapshot));
    }

    #[test]
    fn test_pattern_match() {
        let mut detector = ActionDetector::new();
        detector.add_patterns([r"\b5\b"]);
        assert!(detector.has_pattern(r"\b5\b"));

        let rule = DetectionRule::in_region(CANVAS).pattern(r"\b5\b");
        assert!(detector.evaluate(&rule, &UiSnapshot::new().with_region(CANVAS, "repetir 5 veces")));
        assert!(!detector.evaluate(&rule, &UiSnapshot::new().with_region(CANVAS, "repetir 15 veces")));
    }

    #[test]
    fn test_uncached_pattern_is_compiled_on_demand() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS).pattern("^hola");
        assert!(detector.evaluate(&rule, &UiSnapshot::new().with_region(CANVAS, "hola mundo")));
    }

    #[test]
    fn test_invalid_pattern_is_negative() {
        let mut detector = ActionDetector::new();
        detector.add_patterns(["[invalid"]);
        assert!(!detector.has_pattern("[invalid"));

        // Even a matching keyword does not rescue a malformed rule
        let rule = DetectionRule::in_region(CANVAS)
            .keyword("repetir")
            .pattern("[invalid");
        let snapshot = UiSnapshot::new().with_region(CANVAS, "repetir");

        assert!(matches!(
            detector.try_evaluate(&rule, &snapshot),
            Err(DetectionError::InvalidPattern { .. })
        ));
        assert!(!detector.evaluate(&rule, &snapshot));
    }

    #[test]
    fn test_empty_rule_is_negative() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::default();
        assert_eq!(
            detector.try_evaluate(&rule, &UiSnapshot::new()),
            Err(DetectionError::EmptyRule)
        );
        assert!(!detector.evaluate(&rule, &UiSnapshot::new()));
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS).keyword("");
        let snapshot = UiSnapshot::new().with_region(CANVAS, "anything");
        assert!(!detector.evaluate(&rule, &snapshot));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let detector = ActionDetector::new();
        let rule = DetectionRule::in_region(CANVAS).concept("texto");
        let snapshot = UiSnapshot::new().with_region(CANVAS, "¡Hola Mundo!");
        for _ in 0..3 {
            assert!(detector.evaluate(&rule, &snapshot));
        }
    }

    #[test]
    fn test_evaluate_surface_reads_fresh_state() {
        let detector = ActionDetector::new();
        let surface = InMemorySurface::new();
        let rule = DetectionRule::in_region(CANVAS).concept("repetir");

        assert!(!detector.evaluate_surface(&rule, &surface));
        surface.set_region_text(CANVAS, "repeat 5 times");
        assert!(detector.evaluate_surface(&rule, &surface));
    }
}
