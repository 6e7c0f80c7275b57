//! Lifecycle events emitted by the pipeline.
//!
//! Library code never prints; anything a user should see goes through a
//! [`PipelineObserver`]. [`TracingObserver`] is the default.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::Usage;
use crate::playbook::Category;
use crate::stages::Stage;

#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    StageStarted {
        stage: Stage,
    },
    /// `items` is the stage's headline count (observations, resolved labs,
    /// learned patterns, or playbook size after curation).
    StageCompleted {
        stage: Stage,
        items: usize,
    },
    OracleCall {
        stage: Stage,
        temperature: f32,
        elapsed: Duration,
        usage: Option<Usage>,
    },
    RetryAttempted {
        stage: Stage,
        attempt: usize,
        max_attempts: usize,
        error: &'a str,
    },
    PatternAdmitted {
        category: Category,
        pattern: &'a str,
    },
    PatternDuplicate {
        category: Category,
        pattern: &'a str,
    },
    PatternEvicted {
        category: Category,
        pattern: &'a str,
    },
    PatternDropped {
        pattern: &'a str,
    },
    NoteCommitted {
        note_id: &'a str,
        playbook_size: usize,
    },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent<'_>);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::StageStarted { stage } => info!("[{stage}] started"),
            PipelineEvent::StageCompleted { stage, items } => {
                info!("[{stage}] completed ({items} items)");
            }
            PipelineEvent::OracleCall {
                stage,
                temperature,
                elapsed,
                usage,
            } => {
                let tokens = usage.map_or(0, |u| u.total_tokens);
                info!(
                    "[{stage}] oracle call: temperature={temperature} time={:.2}s tokens={tokens}",
                    elapsed.as_secs_f64()
                );
            }
            PipelineEvent::RetryAttempted {
                stage,
                attempt,
                max_attempts,
                error,
            } => {
                warn!("[{stage}] JSON parsing failed (attempt {attempt}/{max_attempts}): {error}");
            }
            PipelineEvent::PatternAdmitted { category, pattern } => {
                info!("Added to {category}: {}", preview(pattern));
            }
            PipelineEvent::PatternDuplicate { category, pattern } => {
                debug!("Already in {category}: {}", preview(pattern));
            }
            PipelineEvent::PatternEvicted { category, pattern } => {
                info!("Evicted from {category}: {}", preview(pattern));
            }
            PipelineEvent::PatternDropped { pattern } => {
                debug!("No category for pattern: {}", preview(pattern));
            }
            PipelineEvent::NoteCommitted {
                note_id,
                playbook_size,
            } => info!("Note {note_id} committed, playbook holds {playbook_size} entries"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent<'_>) {}
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 83);
        assert_eq!(preview("short"), "short");
    }
}
