#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Lab-value extraction with a self-improving playbook.
//!
//! Each clinical note runs through four stages: extraction, recency
//! resolution, reflection and curation. The curated playbook is fed back
//! into the prompts of the next note.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod comparison;
pub mod curator;
pub mod error;
pub mod events;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod playbook;
pub mod stages;
pub mod types;

pub use comparison::{Comparison, RecallReport, RunSummary};
pub use curator::{ClassificationRule, ClassificationRules, Curator};
pub use error::{Error, Result};
pub use events::{NoopObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use oracle::Oracle;
pub use parser::{ParseState, RetryState, StructuredParser};
pub use pipeline::{HistoryEntry, LabPipeline, NoteOutcome, PipelineConfig, PlaybookSnapshotSummary};
pub use playbook::{Category, Playbook, Section};
pub use stages::{AmbiguityPolicy, Prompt, Stage};
pub use types::{
    AmbiguousCase, ExtractionQuality, ExtractionResult, GroundTruth, LabObservation,
    RecencyQuality, RecencyResult, ReflectionResult, ResolvedLab,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text-generation backend.
///
/// Implementations perform exactly one request per call. Transport errors
/// are returned as-is; nothing above this trait retries them.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32)
    -> anyhow::Result<LLMResponse>;
    fn model(&self) -> &str;
}

#[async_trait]
impl<P: LLMProvider + ?Sized> LLMProvider for Box<P> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> anyhow::Result<LLMResponse> {
        (**self).chat(messages, temperature).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

#[async_trait]
impl<P: LLMProvider + ?Sized> LLMProvider for Arc<P> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> anyhow::Result<LLMResponse> {
        (**self).chat(messages, temperature).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}
