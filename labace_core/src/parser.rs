//! Turning free-form oracle output into typed stage results.
//!
//! Decoding is all-or-nothing. A reply that does not decode is sent back to
//! the oracle together with the decode error, and the whole reply is decoded
//! again. After `max_attempts` failed decodes the stage fails with
//! [`Error::Parse`].

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::LLMProvider;
use crate::error::{Error, Result};
use crate::events::{PipelineEvent, PipelineObserver};
use crate::oracle::Oracle;
use crate::stages::{Prompt, Stage};

/// Default number of decode attempts per stage, the first one included.
pub const DEFAULT_MAX_RETRIES: usize = 3;

static LEADING_FENCE: OnceLock<Regex> = OnceLock::new();
static TRAILING_FENCE: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn leading_fence() -> &'static Regex {
    LEADING_FENCE.get_or_init(|| {
        Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn trailing_fence() -> &'static Regex {
    TRAILING_FENCE.get_or_init(|| {
        Regex::new(r"\r?\n?```$").expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Remove one leading fence marker (with optional language tag) and one
/// trailing fence marker.
#[must_use]
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = leading_fence()
        .find(text)
        .map_or(text, |m| &text[m.end()..]);
    let text = trailing_fence()
        .find(text)
        .map_or(text, |m| &text[..m.start()]);
    text.trim()
}

pub fn decode<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_fences(text))
}

/// Re-prompt asking the oracle to fix its previous reply.
#[must_use]
pub fn corrective_prompt(error: &str, previous: &str, original_user: &str) -> String {
    format!(
        "The previous response had a JSON formatting error: {error}

Previous response:
{previous}

Please provide a corrected response. Remember:
- Return ONLY valid JSON
- No markdown formatting (no ```json or ```)
- Ensure all quotes are properly escaped
- Ensure all brackets and braces are properly closed
- Ensure all property names are enclosed in double quotes

{original_user}"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Decoding the reply obtained for `attempt`.
    Parsing { attempt: usize },
    /// Decode failed; a corrected reply is needed for `attempt`.
    Retrying { attempt: usize },
    Success { attempt: usize },
    Failed { attempts: usize },
}

/// Bookkeeping for one stage's decode loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    stage: Stage,
    state: ParseState,
    max_attempts: usize,
    last_error: Option<String>,
    last_raw_text: String,
}

impl RetryState {
    /// Start in `Parsing { attempt: 1 }` with the first reply.
    #[must_use]
    pub fn new(stage: Stage, max_attempts: usize, first_raw: String) -> Self {
        Self {
            stage,
            state: ParseState::Parsing { attempt: 1 },
            max_attempts: max_attempts.max(1),
            last_error: None,
            last_raw_text: first_raw,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ParseState {
        self.state
    }

    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Decode the current reply. Only meaningful in `Parsing`; in any other
    /// state this returns `None` and leaves the state alone.
    pub fn try_decode<T: DeserializeOwned>(&mut self) -> Option<T> {
        let ParseState::Parsing { attempt } = self.state else {
            return None;
        };

        match decode::<T>(&self.last_raw_text) {
            Ok(value) => {
                self.state = ParseState::Success { attempt };
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.state = if attempt < self.max_attempts {
                    ParseState::Retrying {
                        attempt: attempt + 1,
                    }
                } else {
                    ParseState::Failed { attempts: attempt }
                };
                None
            }
        }
    }

    /// Feed the corrected reply and go back to `Parsing`.
    pub fn resume(&mut self, raw: String) {
        if let ParseState::Retrying { attempt } = self.state {
            self.last_raw_text = raw;
            self.state = ParseState::Parsing { attempt };
        }
    }

    /// The re-prompt for the current failure.
    #[must_use]
    pub fn corrective_prompt(&self, original_user: &str) -> String {
        corrective_prompt(
            self.last_error.as_deref().unwrap_or("unknown error"),
            &self.last_raw_text,
            original_user,
        )
    }

    #[must_use]
    pub fn into_error(self) -> Error {
        let attempts = match self.state {
            ParseState::Failed { attempts } => attempts,
            ParseState::Parsing { attempt }
            | ParseState::Retrying { attempt }
            | ParseState::Success { attempt } => attempt,
        };
        Error::Parse {
            stage: self.stage,
            attempts,
            raw: self.last_raw_text,
            message: self
                .last_error
                .unwrap_or_else(|| "no decode attempted".to_string()),
        }
    }
}

/// Drives [`RetryState`] against an [`Oracle`].
#[derive(Debug, Clone, Copy)]
pub struct StructuredParser {
    max_retries: usize,
}

impl Default for StructuredParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl StructuredParser {
    #[must_use]
    pub const fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// Send `prompt` and decode the reply as `T`, re-prompting on malformed
    /// output. Retries reuse the system instruction and temperature of
    /// `prompt`. Oracle failures abort immediately.
    pub async fn run<T, P>(
        &self,
        oracle: &Oracle<P>,
        stage: Stage,
        prompt: &Prompt,
        observer: &dyn PipelineObserver,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        P: LLMProvider,
    {
        let raw = oracle.generate_prompt(stage, prompt).await?;
        let mut state = RetryState::new(stage, self.max_retries, raw);

        loop {
            if let Some(value) = state.try_decode::<T>() {
                return Ok(value);
            }

            let ParseState::Retrying { attempt } = state.state() else {
                return Err(state.into_error());
            };

            observer.on_event(&PipelineEvent::RetryAttempted {
                stage,
                attempt: attempt - 1,
                max_attempts: state.max_attempts(),
                error: state.last_error().unwrap_or_default(),
            });

            let corrective = state.corrective_prompt(&prompt.user);
            let raw = oracle
                .generate(stage, &prompt.system, &corrective, prompt.temperature)
                .await?;
            state.resume(raw);
        }
    }
}
