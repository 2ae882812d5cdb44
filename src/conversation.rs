//! One conversational turn, end to end.
//!
//! ```text
//! Start ──▶ Rewrite ──▶ Retrieve ──▶ Synthesize ──▶ Commit ──▶ Done
//!   │          │            │             │
//!   └──────────┴────────────┴─────────────┴──▶ error (transcript untouched)
//! ```
//!
//! The user and assistant turns are appended only after the answer exists,
//! so a failed turn leaves no trace in the session history and can simply
//! be retried.

use std::sync::Arc;

use docchat_core::models::{ScoredChunk, Transcript, Turn};
use docchat_core::session::SessionStore;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::ChatError;
use crate::retriever::Retriever;
use crate::rewrite::QueryRewriter;
use crate::synthesize::AnswerSynthesizer;

/// What a completed turn returns to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    /// The session transcript after the turn was committed.
    pub transcript: Transcript,
    /// The query used for retrieval. The answer model sees the utterance
    /// as typed, with the transcript for context.
    pub standalone_query: String,
    pub sources: Vec<ScoredChunk>,
}

pub struct Conversation {
    sessions: Arc<SessionStore>,
    rewriter: QueryRewriter,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    retrieval_k: usize,
}

impl Conversation {
    pub fn new(
        sessions: Arc<SessionStore>,
        rewriter: QueryRewriter,
        retriever: Retriever,
        synthesizer: AnswerSynthesizer,
        retrieval_k: usize,
    ) -> Self {
        Self {
            sessions,
            rewriter,
            retriever,
            synthesizer,
            retrieval_k,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer `utterance` in the context of session `session_id`.
    #[instrument(skip(self, utterance))]
    pub async fn converse(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<TurnOutcome, ChatError> {
        if utterance.trim().is_empty() {
            return Err(ChatError::EmptyUtterance);
        }

        let history = self.sessions.get_or_create(session_id);

        let standalone_query = self.rewriter.rewrite(&history, utterance).await?;
        let sources = self
            .retriever
            .retrieve(&standalone_query, self.retrieval_k)
            .await?;
        let answer = self
            .synthesizer
            .synthesize(utterance, &sources, &history)
            .await?;

        self.sessions.append(session_id, Turn::user(utterance))?;
        self.sessions.append(session_id, Turn::assistant(answer.clone()))?;
        let transcript = self
            .sessions
            .transcript(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        info!(
            turns = transcript.len(),
            sources = sources.len(),
            "turn committed"
        );
        Ok(TurnOutcome {
            answer,
            transcript,
            standalone_query,
            sources,
        })
    }
}
