//! Filing learned patterns into the playbook.
//!
//! Classification is an ordered rule table: the first rule whose keyword
//! occurs in the lower-cased pattern decides the category. Patterns that
//! match no rule are dropped.

use serde::{Deserialize, Serialize};

use crate::events::{PipelineEvent, PipelineObserver};
use crate::playbook::{Category, DEFAULT_CAPACITY, Playbook};
use crate::types::ReflectionResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new<I, S>(category: Category, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// `lowered` must already be lower-case.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_lowercase()))
    }
}

/// Rules evaluated in order; first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRules {
    rules: Vec<ClassificationRule>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new(
                Category::Extraction,
                ["extract", "look for", "check", "scan", "find", "capture"],
            ),
            ClassificationRule::new(
                Category::Validation,
                ["validate", "verify", "most recent", "latest", "compare", "date"],
            ),
            ClassificationRule::new(
                Category::Formatting,
                ["format", "pattern", "structure", "table", "section"],
            ),
        ])
    }
}

impl ClassificationRules {
    #[must_use]
    pub const fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    #[must_use]
    pub fn classify(&self, pattern: &str) -> Option<Category> {
        let lowered = pattern.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.category)
    }
}

/// The only writer of playbook state.
#[derive(Debug, Clone)]
pub struct Curator {
    rules: ClassificationRules,
    capacity: usize,
}

impl Default for Curator {
    fn default() -> Self {
        Self::new(ClassificationRules::default(), DEFAULT_CAPACITY)
    }
}

impl Curator {
    #[must_use]
    pub const fn new(rules: ClassificationRules, capacity: usize) -> Self {
        Self { rules, capacity }
    }

    /// Admit the reflection's learned patterns and return the updated
    /// playbook. Each category keeps its newest `capacity` entries.
    #[must_use]
    pub fn curate(
        &self,
        mut playbook: Playbook,
        reflection: &ReflectionResult,
        observer: &dyn PipelineObserver,
    ) -> Playbook {
        for pattern in &reflection.learned_patterns {
            let Some(category) = self.rules.classify(pattern) else {
                observer.on_event(&PipelineEvent::PatternDropped { pattern });
                continue;
            };

            if playbook.admit(category, pattern) {
                observer.on_event(&PipelineEvent::PatternAdmitted { category, pattern });
            } else {
                observer.on_event(&PipelineEvent::PatternDuplicate { category, pattern });
            }
        }

        for (category, pattern) in playbook.enforce_capacity(self.capacity) {
            observer.on_event(&PipelineEvent::PatternEvicted {
                category,
                pattern: &pattern,
            });
        }

        playbook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopObserver;

    fn reflection(patterns: &[&str]) -> ReflectionResult {
        ReflectionResult {
            learned_patterns: patterns.iter().map(ToString::to_string).collect(),
            ..ReflectionResult::default()
        }
    }

    #[test]
    fn classifies_by_first_matching_rule() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("Scan the discharge summary"),
            Some(Category::Extraction)
        );
        assert_eq!(
            rules.classify("Prefer the LATEST value"),
            Some(Category::Validation)
        );
        assert_eq!(
            rules.classify("Labs often appear in a table"),
            Some(Category::Formatting)
        );
        assert_eq!(rules.classify("Be careful"), None);
    }

    #[test]
    fn extraction_wins_ties_with_validation() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("Check the date of the most recent panel"),
            Some(Category::Extraction)
        );
        assert_eq!(
            rules.classify("Verify values and find any missed in the table section"),
            Some(Category::Extraction)
        );
    }

    #[test]
    fn custom_rule_order_is_respected() {
        let rules = ClassificationRules::new(vec![
            ClassificationRule::new(Category::Formatting, ["table"]),
            ClassificationRule::new(Category::Extraction, ["scan"]),
        ]);
        assert_eq!(
            rules.classify("Scan each table"),
            Some(Category::Formatting)
        );
    }

    #[test]
    fn rules_round_trip_through_config_json() -> serde_json::Result<()> {
        let json = r#"[{"category":"validation_strategies","keywords":["Trend"]}]"#;
        let rules: ClassificationRules = serde_json::from_str(json)?;
        assert_eq!(rules.classify("watch the trend"), Some(Category::Validation));
        Ok(())
    }

    #[test]
    fn curate_files_patterns_and_drops_unmatched() {
        let curator = Curator::default();
        let playbook = curator.curate(
            Playbook::new(),
            &reflection(&[
                "Look for labs in the assessment",
                "Compare admission and discharge dates",
                "Lab panels use a Na/K/Cl structure",
                "Be thorough",
            ]),
            &NoopObserver,
        );

        assert_eq!(
            playbook.entries(Category::Extraction),
            ["Look for labs in the assessment"]
        );
        assert_eq!(
            playbook.entries(Category::Validation),
            ["Compare admission and discharge dates"]
        );
        assert_eq!(
            playbook.entries(Category::Formatting),
            ["Lab panels use a Na/K/Cl structure"]
        );
        assert_eq!(playbook.len(), 3);
    }

    #[test]
    fn curate_with_no_patterns_is_a_no_op() {
        let curator = Curator::default();
        let mut before = Playbook::new();
        before.admit(Category::Validation, "Verify units");

        let after = curator.curate(before.clone(), &reflection(&[]), &NoopObserver);

        assert_eq!(after, before);
    }

    #[test]
    fn curate_respects_capacity() {
        let curator = Curator::new(ClassificationRules::default(), 2);
        let playbook = curator.curate(
            Playbook::new(),
            &reflection(&["scan a", "scan b", "scan c"]),
            &NoopObserver,
        );
        assert_eq!(playbook.entries(Category::Extraction), ["scan b", "scan c"]);
    }
}
