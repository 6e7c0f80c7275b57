//! Schemas exchanged with the oracle at each stage.
//!
//! Oracles are sloppy about JSON types, so string fields also accept numbers
//! and booleans, and optional fields fall back to empty values.

use serde::{Deserialize, Deserializer, Serialize};

/// Date sentinel used when a note gives no date for an observation.
pub const DATE_NOT_SPECIFIED: &str = "not specified";

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
        Null(()),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
        Scalar::Flag(b) => b.to_string(),
        Scalar::Null(()) => String::new(),
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Item(#[serde(deserialize_with = "lenient_string")] String);

    let items = Option::<Vec<Item>>::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(|Item(s)| s)
        .collect())
}

fn not_specified() -> String {
    DATE_NOT_SPECIFIED.to_string()
}

/// One lab value as it appears in a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabObservation {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub labs: Vec<LabObservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLab {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousCase {
    #[serde(deserialize_with = "lenient_string")]
    pub lab_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub possible_values: Vec<String>,
}

/// Output of recency resolution: one value per lab plus the unresolved ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyResult {
    #[serde(default)]
    pub most_recent_labs: Vec<ResolvedLab>,
    #[serde(default)]
    pub ambiguous_cases: Vec<AmbiguousCase>,
}

impl RecencyResult {
    /// Lower-cased resolved lab names, first occurrence order, no repeats.
    #[must_use]
    pub fn lab_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.most_recent_labs.len());
        for lab in &self.most_recent_labs {
            let name = lab.name.to_lowercase();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    #[must_use]
    pub fn ambiguous_case_for(&self, lab_name: &str) -> Option<&AmbiguousCase> {
        self.ambiguous_cases
            .iter()
            .find(|case| case.lab_name.eq_ignore_ascii_case(lab_name))
    }
}

/// Reference answer for a note. Shares the resolved-lab shape.
pub type GroundTruth = RecencyResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionQuality {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub labs_found: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub labs_missed: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub incorrect_extractions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyQuality {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub correct_identifications: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub incorrect_identifications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionResult {
    #[serde(default)]
    pub extraction_quality: ExtractionQuality,
    #[serde(default)]
    pub most_recent_identification_quality: RecencyQuality,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub learned_patterns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_become_strings() -> serde_json::Result<()> {
        let lab: LabObservation =
            serde_json::from_str(r#"{"name":"Sodium","value":138,"unit":"mEq/L"}"#)?;
        assert_eq!(lab.value, "138");
        assert_eq!(lab.date, DATE_NOT_SPECIFIED);
        assert!(lab.context.is_empty());
        Ok(())
    }

    #[test]
    fn missing_name_is_rejected() {
        let lab = serde_json::from_str::<LabObservation>(r#"{"value":"4.1"}"#);
        assert!(lab.is_err());
    }

    #[test]
    fn reflection_tolerates_missing_sections() -> serde_json::Result<()> {
        let reflection: ReflectionResult =
            serde_json::from_str(r#"{"learned_patterns":["Scan lab tables", 7]}"#)?;
        assert_eq!(reflection.learned_patterns, vec!["Scan lab tables", "7"]);
        assert!(reflection.extraction_quality.labs_missed.is_empty());
        Ok(())
    }

    #[test]
    fn null_pattern_list_reads_as_empty() -> serde_json::Result<()> {
        let reflection: ReflectionResult = serde_json::from_str(r#"{"learned_patterns":null}"#)?;
        assert!(reflection.learned_patterns.is_empty());
        Ok(())
    }

    #[test]
    fn lab_names_are_lowercased_and_unique() -> serde_json::Result<()> {
        let result: RecencyResult = serde_json::from_str(
            r#"{"most_recent_labs":[
                {"name":"Sodium","value":"138"},
                {"name":"SODIUM","value":"139"},
                {"name":"Potassium","value":"4.1"}
            ]}"#,
        )?;
        assert_eq!(result.lab_names(), vec!["sodium", "potassium"]);
        assert!(result.ambiguous_cases.is_empty());
        Ok(())
    }
}
