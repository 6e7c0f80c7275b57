//! The playbook: learned strategies grouped in three bounded categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of entries kept per category.
pub const DEFAULT_CAPACITY: usize = 10;

const EMPTY_PLAYBOOK: &str = "No strategies learned yet. This is your first case.";
const EMPTY_SECTION: &str = "No strategies learned yet for this section.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "extraction_strategies")]
    Extraction,
    #[serde(rename = "validation_strategies")]
    Validation,
    #[serde(rename = "formatting_patterns")]
    Formatting,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Extraction, Self::Validation, Self::Formatting];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction_strategies",
            Self::Validation => "validation_strategies",
            Self::Formatting => "formatting_patterns",
        }
    }

    const fn heading(self) -> &'static str {
        match self {
            Self::Extraction => "EXTRACTION STRATEGIES:",
            Self::Validation => "VALIDATION STRATEGIES:",
            Self::Formatting => "FORMATTING PATTERNS:",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the playbook a prompt gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    All,
    Only(Category),
}

impl Section {
    fn includes(self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => c == category,
        }
    }
}

/// Ordered, duplicate-free strategy lists. Oldest entries first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    extraction_strategies: Vec<String>,
    #[serde(default)]
    validation_strategies: Vec<String>,
    #[serde(default)]
    formatting_patterns: Vec<String>,
}

impl Playbook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self, category: Category) -> &[String] {
        match category {
            Category::Extraction => &self.extraction_strategies,
            Category::Validation => &self.validation_strategies,
            Category::Formatting => &self.formatting_patterns,
        }
    }

    fn entries_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Extraction => &mut self.extraction_strategies,
            Category::Validation => &mut self.validation_strategies,
            Category::Formatting => &mut self.formatting_patterns,
        }
    }

    #[must_use]
    pub fn contains(&self, category: Category, pattern: &str) -> bool {
        self.entries(category).iter().any(|p| p == pattern)
    }

    /// Append `pattern` unless the exact string is already in `category`.
    ///
    /// Returns whether the pattern was added. Capacity is not enforced here;
    /// see [`Playbook::enforce_capacity`].
    pub fn admit(&mut self, category: Category, pattern: &str) -> bool {
        if self.contains(category, pattern) {
            return false;
        }
        self.entries_mut(category).push(pattern.to_string());
        true
    }

    /// Keep only the newest `capacity` entries of every category.
    ///
    /// Returns the evicted entries, oldest first.
    pub fn enforce_capacity(&mut self, capacity: usize) -> Vec<(Category, String)> {
        let mut evicted = Vec::new();
        for category in Category::ALL {
            let entries = self.entries_mut(category);
            if entries.len() > capacity {
                let overflow = entries.len() - capacity;
                evicted.extend(entries.drain(..overflow).map(|p| (category, p)));
            }
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.entries(*c).len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry counts as `(extraction, validation, formatting)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.extraction_strategies.len(),
            self.validation_strategies.len(),
            self.formatting_patterns.len(),
        )
    }

    /// Render the requested section as numbered lists for prompt inclusion.
    #[must_use]
    pub fn render(&self, section: Section) -> String {
        if self.is_empty() {
            return EMPTY_PLAYBOOK.to_string();
        }

        let mut out = String::new();
        for category in Category::ALL {
            let entries = self.entries(category);
            if !section.includes(category) || entries.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(category.heading());
            out.push('\n');
            for (i, entry) in entries.iter().enumerate() {
                out.push_str(&format!("{}. {entry}\n", i + 1));
            }
        }

        if out.is_empty() {
            EMPTY_SECTION.to_string()
        } else {
            out
        }
    }

    /// Pretty JSON with the three category keys.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Playbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Section::All))
    }
}
