//! Measuring what the learned playbook buys on a single note.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::LLMProvider;
use crate::error::Result;
use crate::pipeline::LabPipeline;
use crate::playbook::Playbook;
use crate::types::{ExtractionResult, GroundTruth, RecencyResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub extraction: ExtractionResult,
    pub most_recent: RecencyResult,
    /// Distinct resolved lab names, case-insensitive.
    pub labs_found: usize,
}

impl RunSummary {
    fn new(extraction: ExtractionResult, most_recent: RecencyResult) -> Self {
        let labs_found = most_recent.lab_names().len();
        Self {
            extraction,
            most_recent,
            labs_found,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecallReport {
    pub empty: f64,
    pub learned: f64,
    pub improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub empty_playbook: RunSummary,
    pub learned_playbook: RunSummary,
    /// Lower-cased names resolved with the learned playbook only.
    pub newly_found_labs: Vec<String>,
    pub improvement: usize,
    pub recall: Option<RecallReport>,
}

/// Learned-run names minus empty-run names, case-insensitive, in learned-run
/// order.
#[must_use]
pub fn newly_found(empty: &RecencyResult, learned: &RecencyResult) -> Vec<String> {
    let baseline: HashSet<String> = empty.lab_names().into_iter().collect();
    learned
        .lab_names()
        .into_iter()
        .filter(|name| !baseline.contains(name))
        .collect()
}

/// Share of ground-truth labs that `found` resolved. Zero for an empty
/// ground truth.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "lab counts are small")]
pub fn recall(found: &RecencyResult, ground_truth: &GroundTruth) -> f64 {
    let expected: HashSet<String> = ground_truth.lab_names().into_iter().collect();
    if expected.is_empty() {
        return 0.0;
    }
    let hits = found
        .lab_names()
        .iter()
        .filter(|name| expected.contains(*name))
        .count();
    hits as f64 / expected.len() as f64
}

impl<P: LLMProvider> LabPipeline<P> {
    /// Run extraction and recency resolution twice, once with an empty
    /// playbook and once with the live one. Nothing is curated and the live
    /// playbook is left untouched.
    pub async fn compare_with_without_playbook(
        &self,
        note_text: &str,
        ground_truth: Option<&GroundTruth>,
    ) -> Result<Comparison> {
        let empty = Playbook::new();

        info!("Comparison run 1: empty playbook");
        let extraction_empty = self.extract(note_text, &empty).await?;
        let most_recent_empty = self.resolve(&extraction_empty, &empty).await?;

        info!("Comparison run 2: learned playbook ({} entries)", self.playbook().len());
        let extraction_learned = self.extract(note_text, self.playbook()).await?;
        let most_recent_learned = self.resolve(&extraction_learned, self.playbook()).await?;

        let newly_found_labs = newly_found(&most_recent_empty, &most_recent_learned);
        let recall_report = ground_truth.map(|truth| {
            let empty = recall(&most_recent_empty, truth);
            let learned = recall(&most_recent_learned, truth);
            RecallReport {
                empty,
                learned,
                improvement: learned - empty,
            }
        });

        info!(
            "Comparison done: {} new labs with learned playbook",
            newly_found_labs.len()
        );

        Ok(Comparison {
            empty_playbook: RunSummary::new(extraction_empty, most_recent_empty),
            learned_playbook: RunSummary::new(extraction_learned, most_recent_learned),
            improvement: newly_found_labs.len(),
            newly_found_labs,
            recall: recall_report,
        })
    }
}
