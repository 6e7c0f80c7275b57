//! Scripted oracle and recording observer shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use labace_core::{
    ChatMessage, LLMProvider, LLMResponse, LabPipeline, NoopObserver, PipelineConfig,
    PipelineEvent, PipelineObserver, Role, Usage,
};

#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Replays canned replies in order and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        for reply in replies {
            provider.push_reply(reply);
        }
        Arc::new(provider)
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, error: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(error.into()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> anyhow::Result<LLMResponse> {
        let pick = |role: Role| {
            messages
                .iter()
                .find(|m| m.role == role)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        };
        self.calls.lock().unwrap().push(Call {
            system: pick(Role::System),
            user: pick(Role::User),
            temperature,
        });

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LLMResponse {
                content,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            }),
            Some(Err(error)) => Err(anyhow::anyhow!(error)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Keeps a text rendering of every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        let line = match event {
            PipelineEvent::StageStarted { stage } => format!("started {stage}"),
            PipelineEvent::StageCompleted { stage, items } => format!("completed {stage} {items}"),
            PipelineEvent::OracleCall { stage, .. } => format!("oracle {stage}"),
            PipelineEvent::RetryAttempted {
                stage,
                attempt,
                max_attempts,
                ..
            } => format!("retry {stage} {attempt}/{max_attempts}"),
            PipelineEvent::PatternAdmitted { category, pattern } => {
                format!("admitted {category} {pattern}")
            }
            PipelineEvent::PatternDuplicate { category, pattern } => {
                format!("duplicate {category} {pattern}")
            }
            PipelineEvent::PatternEvicted { category, pattern } => {
                format!("evicted {category} {pattern}")
            }
            PipelineEvent::PatternDropped { pattern } => format!("dropped {pattern}"),
            PipelineEvent::NoteCommitted { note_id, .. } => format!("committed {note_id}"),
        };
        self.events.lock().unwrap().push(line);
    }
}

pub fn pipeline(provider: &Arc<ScriptedProvider>) -> LabPipeline<Arc<ScriptedProvider>> {
    pipeline_with(provider, PipelineConfig::default())
}

pub fn pipeline_with(
    provider: &Arc<ScriptedProvider>,
    config: PipelineConfig,
) -> LabPipeline<Arc<ScriptedProvider>> {
    LabPipeline::new(Arc::clone(provider), config).with_observer(Arc::new(NoopObserver))
}

pub const SODIUM_NOTE: &str = "Admission labs: Sodium 140 mEq/L on 2024-01-01.\n\
Discharge labs: Sodium 138 mEq/L on 2024-01-03.";

pub const SODIUM_EXTRACTION: &str = r#"{
  "labs": [
    {"name": "Sodium", "value": "140", "unit": "mEq/L", "date": "2024-01-01", "context": "admission labs"},
    {"name": "Sodium", "value": "138", "unit": "mEq/L", "date": "2024-01-03", "context": "discharge labs"}
  ]
}"#;

pub const SODIUM_RECENCY: &str = r#"{
  "most_recent_labs": [
    {"name": "Sodium", "value": "138", "unit": "mEq/L", "date": "2024-01-03", "reasoning": "2024-01-03 is the latest date"}
  ],
  "ambiguous_cases": []
}"#;

pub fn reflection_json(patterns: &[&str]) -> String {
    serde_json::json!({
        "extraction_quality": {
            "labs_found": ["Sodium"],
            "labs_missed": [],
            "incorrect_extractions": []
        },
        "most_recent_identification_quality": {
            "correct_identifications": ["Sodium"],
            "incorrect_identifications": []
        },
        "learned_patterns": patterns
    })
    .to_string()
}
