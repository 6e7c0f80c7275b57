use std::fmt;
use std::path::{Path, PathBuf};

use labace_config::Config;
use labace_core::{GroundTruth, LabPipeline};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::report;

/// Note identifiers may be written as strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NoteId {
    Text(String),
    Number(u64),
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(id) => f.write_str(id),
            Self::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NoteRecord {
    id: NoteId,
    text: String,
    #[serde(default)]
    ground_truth: Option<GroundTruth>,
}

fn load_notes(path: &Path) -> anyhow::Result<Vec<NoteRecord>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read notes file {}: {e}", path.display()))?;
    let notes: Vec<NoteRecord> = serde_json::from_str(&content)?;
    Ok(notes)
}

#[derive(Debug, Clone)]
pub struct RunInput {
    pub notes: PathBuf,
    pub compare: bool,
    pub export: Option<PathBuf>,
}

/// Feeds every note through the pipeline in file order, then reports.
#[derive(Debug, Clone, Copy)]
pub struct RunStrategy;

impl super::CommandStrategy for RunStrategy {
    type Input = RunInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let notes = load_notes(&input.notes)?;
        if notes.is_empty() {
            anyhow::bail!("No notes found in {}", input.notes.display());
        }
        info!("Loaded {} notes from {}", notes.len(), input.notes.display());

        let provider = super::build_provider(&config)?;
        let mut pipeline = LabPipeline::new(provider, config.pipeline_config())
            .with_rules(config.curator_rules());

        let mut failed = 0usize;
        for note in &notes {
            let note_id = note.id.to_string();
            println!("{}", report::note_header(&note_id));

            match pipeline
                .process_note(note_id.as_str(), &note.text, note.ground_truth.as_ref())
                .await
            {
                Ok(outcome) => println!(
                    "{}",
                    report::note_summary(&outcome, pipeline.playbook(), note.ground_truth.is_some())
                ),
                Err(e) => {
                    failed += 1;
                    error!("Note {note_id} failed: {e}");
                    if let Some(raw) = e.raw_output() {
                        warn!("Last oracle output: {}", raw.chars().take(200).collect::<String>());
                    }
                }
            }
        }

        println!("{}", report::evolution(&pipeline.evolution(), pipeline.playbook()));

        if input.compare {
            if let Some(last) = notes.last() {
                info!("Comparing empty vs learned playbook on note {}", last.id);
                match pipeline
                    .compare_with_without_playbook(&last.text, last.ground_truth.as_ref())
                    .await
                {
                    Ok(comparison) => println!("{}", report::comparison_table(&comparison)),
                    Err(e) => error!("Comparison failed: {e}"),
                }
            }
        }

        if let Some(path) = &input.export {
            std::fs::write(path, pipeline.export_playbook()?)?;
            println!("\n✅ Playbook exported to: {}", path.display());
        }

        if failed > 0 {
            warn!("{failed} of {} notes failed and were skipped", notes.len());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_accept_numeric_ids_and_optional_truth() -> anyhow::Result<()> {
        let notes: Vec<NoteRecord> = serde_json::from_str(
            r#"[
                {"id": 1, "text": "Na 140"},
                {"id": "icu-7", "text": "K 4.1", "ground_truth": {
                    "most_recent_labs": [{"name": "Potassium", "value": 4.1}],
                    "ambiguous_cases": []
                }}
            ]"#,
        )?;

        assert_eq!(notes[0].id.to_string(), "1");
        assert!(notes[0].ground_truth.is_none());
        assert_eq!(notes[1].id.to_string(), "icu-7");
        let truth = notes[1]
            .ground_truth
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("missing ground truth"))?;
        assert_eq!(truth.most_recent_labs[0].value, "4.1");
        Ok(())
    }
}
