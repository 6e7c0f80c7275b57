//! Prompt construction for the oracle-backed stages.
//!
//! Builders are pure: they turn typed inputs into a [`Prompt`] and never talk
//! to the oracle themselves. The pipeline sends the prompt and decodes the
//! reply with the stage's schema.

use std::fmt;

use serde::{Deserialize, Serialize};

mod extraction;
mod recency;
mod reflection;

pub use extraction::extraction_prompt;
pub use recency::{AmbiguityPolicy, recency_prompt};
pub use reflection::{note_excerpt, reflection_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    RecencyResolution,
    Reflection,
    Curation,
}

impl Stage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::RecencyResolution => "recency_resolution",
            Self::Reflection => "reflection",
            Self::Curation => "curation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A system/user instruction pair and the temperature to run it at.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

const JSON_ONLY: &str = "Return ONLY the JSON, no other text.";
