//! Error taxonomy for the conversation pipeline.
//!
//! Provider plumbing uses `anyhow`; the pipeline wraps those errors into a
//! [`ChatError`] that records which stage failed, so callers can decide
//! whether a retry makes sense.

use std::fmt;

use docchat_core::session::SessionError;
use thiserror::Error;

/// The step of a turn (or upload) where an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Index,
    Rewrite,
    Retrieve,
    Synthesize,
    Commit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Index => "index",
            Stage::Rewrite => "rewrite",
            Stage::Retrieve => "retrieve",
            Stage::Synthesize => "synthesize",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// The index could not be built; the previous index stays active.
    #[error("index build failed: {0}")]
    IndexBuild(String),

    #[error("embedding service failed during {stage}: {source:#}")]
    EmbeddingService {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("language model service failed during {stage}: {source:#}")]
    LanguageModelService {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("utterance must not be empty")]
    EmptyUtterance,
}

impl ChatError {
    /// The pipeline stage this error belongs to, when there is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ChatError::IndexBuild(_) => Some(Stage::Index),
            ChatError::EmbeddingService { stage, .. } => Some(*stage),
            ChatError::LanguageModelService { stage, .. } => Some(*stage),
            ChatError::SessionNotFound(_) => Some(Stage::Commit),
            _ => None,
        }
    }

    /// Machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::IndexBuild(_) => "index_build",
            ChatError::EmbeddingService { .. } => "embedding_service",
            ChatError::LanguageModelService { .. } => "language_model_service",
            ChatError::SessionNotFound(_) => "not_found",
            ChatError::EmptyUtterance => "bad_request",
        }
    }
}

impl From<SessionError> for ChatError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ChatError::SessionNotFound(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_is_reported() {
        let err = ChatError::LanguageModelService {
            stage: Stage::Synthesize,
            source: anyhow::anyhow!("HTTP 503"),
        };
        assert_eq!(err.stage(), Some(Stage::Synthesize));
        assert_eq!(err.code(), "language_model_service");
        let msg = err.to_string();
        assert!(msg.contains("synthesize"));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn test_every_error_has_a_wire_code() {
        let errors = [
            ChatError::IndexBuild("dims".to_string()),
            ChatError::EmbeddingService {
                stage: Stage::Retrieve,
                source: anyhow::anyhow!("timeout"),
            },
            ChatError::LanguageModelService {
                stage: Stage::Rewrite,
                source: anyhow::anyhow!("HTTP 429"),
            },
            ChatError::SessionNotFound("s".to_string()),
            ChatError::EmptyUtterance,
        ];
        let codes: Vec<&str> = errors.iter().map(ChatError::code).collect();
        assert_eq!(
            codes,
            vec![
                "index_build",
                "embedding_service",
                "language_model_service",
                "not_found",
                "bad_request"
            ]
        );
        assert_eq!(errors[0].stage(), Some(Stage::Index));
        assert_eq!(errors[4].stage(), None);
    }

    #[test]
    fn test_session_error_conversion() {
        let err: ChatError = SessionError::NotFound("abc".to_string()).into();
        assert!(matches!(err, ChatError::SessionNotFound(ref id) if id == "abc"));
        assert_eq!(err.code(), "not_found");
    }
}
