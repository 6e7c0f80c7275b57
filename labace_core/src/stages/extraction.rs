use super::{JSON_ONLY, Prompt};
use crate::playbook::{Category, Playbook, Section};

const SYSTEM: &str = "You are a clinical lab extraction specialist. Extract lab values from clinical notes with high accuracy.

EXTRACTION GUIDELINES:
- Extract ALL lab values mentioned anywhere in the note
- For each lab, capture: name, value, unit, and date (if available)
- If multiple values for the same lab, extract ALL of them with their dates
- Common lab abbreviations: WBC (white blood cells), Hgb (hemoglobin), Plt (platelets), Na (sodium), K (potassium), Cr (creatinine), BUN (blood urea nitrogen)
- Watch for labs in: admission labs, daily labs, discharge labs, lab tables, narrative text
- Return ONLY valid JSON with no additional text or markdown formatting";

const SCHEMA: &str = r#"{
    "labs": [
        {
            "name": "lab name",
            "value": "numeric value",
            "unit": "unit of measurement",
            "date": "date if mentioned (YYYY-MM-DD format, or 'not specified')",
            "context": "where found (e.g., 'admission labs', 'day 2', 'discharge labs')"
        }
    ]
}"#;

/// Ask for every lab value in `note_text`, guided by the extraction strategies.
#[must_use]
pub fn extraction_prompt(note_text: &str, playbook: &Playbook, temperature: f32) -> Prompt {
    let strategies = playbook.render(Section::Only(Category::Extraction));
    let user = format!(
        "PLAYBOOK (strategies learned from previous extractions):
{strategies}

CLINICAL NOTE:
{note_text}

Extract all lab values mentioned in this note. Return JSON in this exact format:
{SCHEMA}

{JSON_ONLY}"
    );

    Prompt {
        system: SYSTEM.to_string(),
        user,
        temperature,
    }
}
