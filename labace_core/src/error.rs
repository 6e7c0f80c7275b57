use thiserror::Error;

use crate::stages::Stage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The provider failed to answer (transport error, HTTP status, timeout).
    #[error("oracle unavailable during {stage}: {source}")]
    OracleUnavailable {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// The oracle never produced decodable output within the attempt budget.
    #[error("failed to parse {stage} output after {attempts} attempts: {message}")]
    Parse {
        stage: Stage,
        attempts: usize,
        raw: String,
        message: String,
    },

    #[error("failed to serialize prompt payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// The stage the failure happened in, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::OracleUnavailable { stage, .. } | Self::Parse { stage, .. } => Some(*stage),
            Self::Serialize(_) => None,
        }
    }

    /// Last raw oracle text for parse failures.
    #[must_use]
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
