//! The per-note learning loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::LLMProvider;
use crate::curator::{ClassificationRules, Curator};
use crate::error::Result;
use crate::events::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::oracle::Oracle;
use crate::parser::{DEFAULT_MAX_RETRIES, StructuredParser};
use crate::playbook::{Category, DEFAULT_CAPACITY, Playbook};
use crate::stages::{
    AmbiguityPolicy, Prompt, Stage, extraction_prompt, recency_prompt, reflection_prompt,
};
use crate::types::{ExtractionResult, GroundTruth, RecencyResult, ReflectionResult};

/// Tunables for one pipeline. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Decode attempts per stage, the first one included.
    pub max_retries: usize,
    /// Temperature for extraction and recency resolution.
    pub temperature: f32,
    pub reflection_temperature: f32,
    /// Characters of the note shown to the reflection stage.
    pub note_excerpt_chars: usize,
    /// Entries kept per playbook category.
    pub playbook_capacity: usize,
    pub ambiguity_policy: AmbiguityPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: 0.1,
            reflection_temperature: 0.3,
            note_excerpt_chars: 1500,
            playbook_capacity: DEFAULT_CAPACITY,
            ambiguity_policy: AmbiguityPolicy::default(),
        }
    }
}

/// What one note produced before curation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteOutcome {
    pub extraction: ExtractionResult,
    pub most_recent: RecencyResult,
    pub reflection: ReflectionResult,
}

/// Audit record for one committed note. The playbook is the state after
/// curation for that note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub note_id: String,
    pub extraction: ExtractionResult,
    pub most_recent: RecencyResult,
    pub reflection: ReflectionResult,
    pub playbook_snapshot: Playbook,
    pub recorded_at: DateTime<Utc>,
}

/// Playbook size after one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybookSnapshotSummary {
    pub note_id: String,
    pub extraction_strategies: usize,
    pub validation_strategies: usize,
    pub formatting_patterns: usize,
}

pub struct LabPipeline<P> {
    oracle: Oracle<P>,
    parser: StructuredParser,
    curator: Curator,
    config: PipelineConfig,
    playbook: Playbook,
    history: Vec<HistoryEntry>,
    observer: Arc<dyn PipelineObserver>,
}

impl<P: LLMProvider> LabPipeline<P> {
    pub fn new(provider: P, config: PipelineConfig) -> Self {
        let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
        Self {
            oracle: Oracle::new(provider).with_observer(observer.clone()),
            parser: StructuredParser::new(config.max_retries),
            curator: Curator::new(ClassificationRules::default(), config.playbook_capacity),
            config,
            playbook: Playbook::new(),
            history: Vec::new(),
            observer,
        }
    }

    /// Use a different classification rule table for curation.
    #[must_use]
    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.curator = Curator::new(rules, self.config.playbook_capacity);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.oracle = self.oracle.with_observer(observer.clone());
        self.observer = observer;
        self
    }

    /// Start from an existing playbook instead of an empty one.
    #[must_use]
    pub fn with_playbook(mut self, playbook: Playbook) -> Self {
        self.playbook = playbook;
        self
    }

    pub const fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn export_playbook(&self) -> serde_json::Result<String> {
        self.playbook.to_json()
    }

    /// Category counts after each committed note, oldest first.
    pub fn evolution(&self) -> Vec<PlaybookSnapshotSummary> {
        self.history
            .iter()
            .map(|entry| {
                let pb = &entry.playbook_snapshot;
                PlaybookSnapshotSummary {
                    note_id: entry.note_id.clone(),
                    extraction_strategies: pb.entries(Category::Extraction).len(),
                    validation_strategies: pb.entries(Category::Validation).len(),
                    formatting_patterns: pb.entries(Category::Formatting).len(),
                }
            })
            .collect()
    }

    /// Run all four stages for one note.
    ///
    /// Playbook and history change only if every stage succeeds; a failed
    /// note leaves both exactly as they were.
    pub async fn process_note(
        &mut self,
        note_id: impl Into<String>,
        note_text: &str,
        ground_truth: Option<&GroundTruth>,
    ) -> Result<NoteOutcome> {
        let note_id = note_id.into();
        info!("Processing note {note_id} ({} chars)", note_text.chars().count());

        let extraction = self.extract(note_text, &self.playbook).await?;
        let most_recent = self.resolve(&extraction, &self.playbook).await?;
        let reflection = self
            .reflect(note_text, &extraction, &most_recent, ground_truth)
            .await?;

        if ground_truth.is_some() && !reflection.extraction_quality.labs_missed.is_empty() {
            info!(
                "Note {note_id}: missed {} labs compared to ground truth",
                reflection.extraction_quality.labs_missed.len()
            );
        }

        self.observer.on_event(&PipelineEvent::StageStarted {
            stage: Stage::Curation,
        });
        let curated = self.curator.curate(
            self.playbook.clone(),
            &reflection,
            self.observer.as_ref(),
        );
        self.observer.on_event(&PipelineEvent::StageCompleted {
            stage: Stage::Curation,
            items: curated.len(),
        });

        self.playbook = curated;
        self.history.push(HistoryEntry {
            note_id: note_id.clone(),
            extraction: extraction.clone(),
            most_recent: most_recent.clone(),
            reflection: reflection.clone(),
            playbook_snapshot: self.playbook.clone(),
            recorded_at: Utc::now(),
        });
        self.observer.on_event(&PipelineEvent::NoteCommitted {
            note_id: &note_id,
            playbook_size: self.playbook.len(),
        });

        Ok(NoteOutcome {
            extraction,
            most_recent,
            reflection,
        })
    }

    /// Extraction stage against an arbitrary playbook.
    pub async fn extract(&self, note_text: &str, playbook: &Playbook) -> Result<ExtractionResult> {
        let prompt = extraction_prompt(note_text, playbook, self.config.temperature);
        let extraction: ExtractionResult = self.run_stage(Stage::Extraction, &prompt).await?;
        self.completed(Stage::Extraction, extraction.labs.len());
        Ok(extraction)
    }

    /// Recency-resolution stage against an arbitrary playbook. The ambiguity
    /// policy is applied to the oracle's answer.
    pub async fn resolve(
        &self,
        extraction: &ExtractionResult,
        playbook: &Playbook,
    ) -> Result<RecencyResult> {
        let prompt = recency_prompt(extraction, playbook, self.config.temperature)?;
        let raw: RecencyResult = self.run_stage(Stage::RecencyResolution, &prompt).await?;
        let resolved = self.config.ambiguity_policy.apply(raw);

        if !resolved.ambiguous_cases.is_empty() {
            info!("{} ambiguous cases flagged", resolved.ambiguous_cases.len());
        }
        self.completed(Stage::RecencyResolution, resolved.most_recent_labs.len());
        Ok(resolved)
    }

    pub async fn reflect(
        &self,
        note_text: &str,
        extraction: &ExtractionResult,
        most_recent: &RecencyResult,
        ground_truth: Option<&GroundTruth>,
    ) -> Result<ReflectionResult> {
        let prompt = reflection_prompt(
            note_text,
            extraction,
            most_recent,
            ground_truth,
            self.config.note_excerpt_chars,
            self.config.reflection_temperature,
        )?;
        let reflection: ReflectionResult = self.run_stage(Stage::Reflection, &prompt).await?;
        self.completed(Stage::Reflection, reflection.learned_patterns.len());
        Ok(reflection)
    }

    async fn run_stage<T>(&self, stage: Stage, prompt: &Prompt) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.observer.on_event(&PipelineEvent::StageStarted { stage });
        self.parser
            .run(&self.oracle, stage, prompt, self.observer.as_ref())
            .await
    }

    fn completed(&self, stage: Stage, items: usize) {
        self.observer.on_event(&PipelineEvent::StageCompleted { stage, items });
    }
}
