//! Uniform `generate` call on top of any [`LLMProvider`].

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::stages::{Prompt, Stage};
use crate::{ChatMessage, LLMProvider};

pub struct Oracle<P> {
    provider: P,
    observer: Arc<dyn PipelineObserver>,
}

impl<P: LLMProvider> Oracle<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Send one system/user pair and return the generated text.
    ///
    /// Any provider failure becomes [`Error::OracleUnavailable`] and is not
    /// retried.
    pub async fn generate(
        &self,
        stage: Stage,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];

        debug!(
            "[{stage}] sending {} chars to {}",
            system.len() + user.len(),
            self.provider.model()
        );

        let started = Instant::now();
        let response = self
            .provider
            .chat(&messages, temperature)
            .await
            .map_err(|source| Error::OracleUnavailable { stage, source })?;

        self.observer.on_event(&PipelineEvent::OracleCall {
            stage,
            temperature,
            elapsed: started.elapsed(),
            usage: response.usage,
        });

        Ok(response.content)
    }

    /// [`Oracle::generate`] for a prepared [`Prompt`].
    pub async fn generate_prompt(&self, stage: Stage, prompt: &Prompt) -> Result<String> {
        self.generate(stage, &prompt.system, &prompt.user, prompt.temperature)
            .await
    }
}
