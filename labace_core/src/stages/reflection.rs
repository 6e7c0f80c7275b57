use super::{JSON_ONLY, Prompt};
use crate::types::{ExtractionResult, GroundTruth, RecencyResult};

const SYSTEM: &str = "You are reviewing lab extraction quality. Analyze what was done well and what could be improved.

REVIEW GUIDELINES:
- Check if all labs mentioned in the note were captured
- Verify correct identification of most recent values
- Look for missed labs in tables, narrative text, or headers
- Identify patterns that would improve future extractions
- If ground truth is provided, compare against it
- Return ONLY valid JSON with no additional text or markdown formatting";

const SCHEMA: &str = r#"{
    "extraction_quality": {
        "labs_found": ["list of labs successfully extracted"],
        "labs_missed": ["list of labs that should have been extracted but weren't"],
        "incorrect_extractions": ["list of any incorrect extractions"]
    },
    "most_recent_identification_quality": {
        "correct_identifications": ["labs where most recent value was correctly identified"],
        "incorrect_identifications": ["labs where wrong value was chosen as most recent"]
    },
    "learned_patterns": ["actionable strategies for future extractions"]
}"#;

/// The first `max_chars` characters of the note, with "..." when cut.
#[must_use]
pub fn note_excerpt(note_text: &str, max_chars: usize) -> String {
    match note_text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &note_text[..cut]),
        None => note_text.to_string(),
    }
}

/// Ask the oracle to critique both earlier stages and propose strategies.
pub fn reflection_prompt(
    note_text: &str,
    extraction: &ExtractionResult,
    most_recent: &RecencyResult,
    ground_truth: Option<&GroundTruth>,
    excerpt_chars: usize,
    temperature: f32,
) -> serde_json::Result<Prompt> {
    let mut user = format!(
        "ORIGINAL NOTE (excerpt):
{}

EXTRACTION RESULTS:
{}

MOST RECENT LAB IDENTIFICATION:
{}",
        note_excerpt(note_text, excerpt_chars),
        serde_json::to_string_pretty(extraction)?,
        serde_json::to_string_pretty(most_recent)?,
    );

    if let Some(truth) = ground_truth {
        user.push_str("\n\nGROUND TRUTH (expected labs):\n");
        user.push_str(&serde_json::to_string_pretty(truth)?);
    }

    user.push_str(&format!(
        "\n\nAnalyze the extraction quality. Return JSON in this format:\n{SCHEMA}\n\n{JSON_ONLY}"
    ));

    Ok(Prompt {
        system: SYSTEM.to_string(),
        user,
        temperature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_notes_whole() {
        assert_eq!(note_excerpt("Na 140", 1500), "Na 140");
        assert_eq!(note_excerpt("abc", 3), "abc");
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        assert_eq!(note_excerpt("abcdef", 4), "abcd...");
        assert_eq!(note_excerpt("ééééé", 2), "éé...");
    }

    #[test]
    fn ground_truth_is_optional() -> serde_json::Result<()> {
        let extraction = ExtractionResult::default();
        let recency = RecencyResult::default();

        let without = reflection_prompt("note", &extraction, &recency, None, 1500, 0.3)?;
        assert!(!without.user.contains("GROUND TRUTH"));
        assert!(without.user.contains("\"learned_patterns\""));

        let truth = GroundTruth::default();
        let with = reflection_prompt("note", &extraction, &recency, Some(&truth), 1500, 0.3)?;
        assert!(with.user.contains("GROUND TRUTH (expected labs):"));
        assert!((with.temperature - 0.3).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn long_notes_are_truncated_in_prompt() -> serde_json::Result<()> {
        let note = "x".repeat(2000);
        let prompt = reflection_prompt(
            &note,
            &ExtractionResult::default(),
            &RecencyResult::default(),
            None,
            1500,
            0.3,
        )?;
        assert!(prompt.user.contains(&format!("{}...", "x".repeat(1500))));
        assert!(!prompt.user.contains(&"x".repeat(1501)));
        Ok(())
    }
}
