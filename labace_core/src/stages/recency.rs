use serde::{Deserialize, Serialize};

use super::{JSON_ONLY, Prompt};
use crate::playbook::{Category, Playbook, Section};
use crate::types::{ExtractionResult, RecencyResult};

const SYSTEM: &str = "You are analyzing lab values to identify the most recent value for each unique lab test.

ANALYSIS GUIDELINES:
- Group labs by test name (e.g., all \"sodium\" values together)
- Identify the most recent value based on date/context
- Handle cases where dates are implicit (e.g., \"admission labs\" vs \"discharge labs\")
- If multiple values have same recency, note this ambiguity
- Return ONLY valid JSON with no additional text or markdown formatting";

const SCHEMA: &str = r#"{
    "most_recent_labs": [
        {
            "name": "lab name",
            "value": "most recent value",
            "unit": "unit",
            "date": "date or context",
            "reasoning": "why this is the most recent"
        }
    ],
    "ambiguous_cases": [
        {
            "lab_name": "lab name",
            "issue": "description of ambiguity",
            "possible_values": ["value1", "value2"]
        }
    ]
}"#;

/// Ask the oracle to pick the most recent value per lab.
pub fn recency_prompt(
    extraction: &ExtractionResult,
    playbook: &Playbook,
    temperature: f32,
) -> serde_json::Result<Prompt> {
    let strategies = playbook.render(Section::Only(Category::Validation));
    let labs = serde_json::to_string_pretty(extraction)?;
    let user = format!(
        "PLAYBOOK (validation strategies learned):
{strategies}

EXTRACTED LAB VALUES:
{labs}

Identify the most recent value for each unique lab test. Return JSON in this format:
{SCHEMA}

{JSON_ONLY}"
    );

    Ok(Prompt {
        system: SYSTEM.to_string(),
        user,
        temperature,
    })
}

/// What to do with a resolved lab that the oracle also flagged as ambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Keep the resolved value and append the ambiguity to its reasoning.
    #[default]
    Annotate,
    /// Drop the resolved value; only the ambiguous case remains.
    Exclude,
}

impl AmbiguityPolicy {
    /// Reconcile `most_recent_labs` with `ambiguous_cases`. Names compare
    /// case-insensitively. Ambiguous cases themselves are never touched.
    #[must_use]
    pub fn apply(self, mut result: RecencyResult) -> RecencyResult {
        match self {
            Self::Exclude => {
                let RecencyResult {
                    most_recent_labs,
                    ambiguous_cases,
                } = result;
                let most_recent_labs = most_recent_labs
                    .into_iter()
                    .filter(|lab| {
                        !ambiguous_cases
                            .iter()
                            .any(|case| case.lab_name.eq_ignore_ascii_case(&lab.name))
                    })
                    .collect();
                RecencyResult {
                    most_recent_labs,
                    ambiguous_cases,
                }
            }
            Self::Annotate => {
                let RecencyResult {
                    most_recent_labs,
                    ambiguous_cases,
                } = &mut result;
                for lab in most_recent_labs.iter_mut() {
                    let Some(case) = ambiguous_cases
                        .iter()
                        .find(|case| case.lab_name.eq_ignore_ascii_case(&lab.name))
                    else {
                        continue;
                    };
                    let note = format!("[ambiguous: {}]", case.issue);
                    if lab.reasoning.contains(&note) {
                        continue;
                    }
                    if !lab.reasoning.is_empty() {
                        lab.reasoning.push(' ');
                    }
                    lab.reasoning.push_str(&note);
                }
                result
            }
        }
    }
}
