//! History-aware query rewriting.
//!
//! Follow-up questions like "And Germany?" only make sense next to the
//! turns before them. The rewriter asks the chat model to turn the latest
//! utterance into a standalone query that can be embedded and searched on
//! its own. With no history there is nothing to resolve, so the utterance
//! is returned as is and no model call is made.

use std::sync::Arc;

use docchat_core::models::Turn;
use tracing::debug;

use crate::error::{ChatError, Stage};
use crate::llm::{ChatMessage, ChatModel};

pub struct QueryRewriter {
    llm: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// Produce a standalone query for `utterance` given `transcript`.
    pub async fn rewrite(&self, transcript: &[Turn], utterance: &str) -> Result<String, ChatError> {
        if transcript.is_empty() {
            return Ok(utterance.to_string());
        }

        let messages = self.messages(transcript, utterance);
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| ChatError::LanguageModelService {
                stage: Stage::Rewrite,
                source: e,
            })?;

        let standalone = output.trim();
        if standalone.is_empty() {
            return Ok(utterance.to_string());
        }
        debug!(utterance, standalone, "rewrote query");
        Ok(standalone.to_string())
    }

    fn messages(&self, transcript: &[Turn], utterance: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(transcript.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(transcript.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(utterance));
        messages
    }
}
